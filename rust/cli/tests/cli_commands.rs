use pokeroom_cli::run;
use serial_test::serial;
use std::io::Write as _;

fn run_capture(args: &[&str]) -> (i32, String, String) {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let code = run(args, &mut out, &mut err);
    (
        code,
        String::from_utf8(out).expect("utf8 stdout"),
        String::from_utf8(err).expect("utf8 stderr"),
    )
}

fn clear_env() {
    unsafe {
        std::env::remove_var("POKEROOM_CLI_CONFIG");
        std::env::remove_var("POKEROOM_SEED");
        std::env::remove_var("POKEROOM_SEATS");
    }
}

#[test]
#[serial]
fn deal_uses_seats_and_seed_from_a_config_file() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "seats = 5\nseed = 31\nstarting_stack = 400").expect("write config");
    unsafe { std::env::set_var("POKEROOM_CLI_CONFIG", file.path()) };

    let (code, out, err) = run_capture(&["pokeroom", "deal"]);
    let (_, again, _) = run_capture(&["pokeroom", "deal"]);
    clear_env();

    assert_eq!(code, 0, "{err}");
    assert!(out.starts_with("Seed: 31\n"));
    assert_eq!(out.lines().filter(|l| l.starts_with("Seat ")).count(), 5);
    assert_eq!(out, again);
}

#[test]
#[serial]
fn flags_override_environment() {
    clear_env();
    unsafe {
        std::env::set_var("POKEROOM_SEED", "8");
        std::env::set_var("POKEROOM_SEATS", "6");
    }
    let (code, out, _) = run_capture(&["pokeroom", "deal", "--seed", "9", "--seats", "3"]);
    let (_, cfg, _) = run_capture(&["pokeroom", "cfg"]);
    clear_env();

    assert_eq!(code, 0);
    assert!(out.starts_with("Seed: 9\n"));
    assert_eq!(out.lines().filter(|l| l.starts_with("Seat ")).count(), 3);

    let cfg: serde_json::Value = serde_json::from_str(&cfg).expect("cfg json");
    assert_eq!(cfg["seats"]["value"], 6);
    assert_eq!(cfg["seats"]["source"], "env");
}

#[test]
#[serial]
fn malformed_config_file_fails_every_command() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "seats = [").expect("write config");
    unsafe { std::env::set_var("POKEROOM_CLI_CONFIG", file.path()) };

    let (cfg_code, _, cfg_err) = run_capture(&["pokeroom", "cfg"]);
    let (sim_code, _, _) = run_capture(&["pokeroom", "sim", "--hands", "3"]);
    clear_env();

    assert_eq!(cfg_code, 2);
    assert!(cfg_err.starts_with("Error: Configuration error"), "{cfg_err}");
    assert_eq!(sim_code, 2);
}

#[test]
#[serial]
fn sim_reports_a_summary() {
    clear_env();
    let (code, out, err) = run_capture(&["pokeroom", "sim", "--hands", "30", "--seed", "17", "--seats", "4"]);
    assert_eq!(code, 0, "{err}");

    let value = |label: &str| -> u64 {
        out.lines()
            .find_map(|l| l.strip_prefix(label))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_else(|| panic!("missing {label} in {out}"))
    };
    let hands = value("Hands:");
    assert!(hands >= 1 && hands <= 30);
    assert!(value("Showdowns:") + value("Uncontested:") <= hands);
    assert!(value("Largest pot:") <= 4000);
}

#[test]
fn eval_reads_cards_in_any_case() {
    let (code, out, _) = run_capture(&["pokeroom", "eval", "as", "ad", "ks", "kd", "kh", "2c"]);
    assert_eq!(code, 0);
    assert!(out.contains("Category: Full House"), "{out}");
}
