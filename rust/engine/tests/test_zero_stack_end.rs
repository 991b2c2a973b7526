use pokeroom_engine::errors::GameError;
use pokeroom_engine::intent::PlayerIntent as I;
use pokeroom_engine::player::SeatStatus;
use pokeroom_engine::room::{Phase, Room, RoomConfig};

#[test]
fn busted_seat_sits_out_and_cannot_ready() {
    // an all-in for the whole stack loses about half the time; some seed busts it
    for seed in 0..64 {
        let mut room = Room::new(RoomConfig {
            seed: Some(seed),
            ..RoomConfig::default()
        })
        .unwrap();
        let (a, _) = room.join("short", 100).unwrap();
        let (b, _) = room.join("deep", 1000).unwrap();
        room.apply(a, I::Ready).unwrap();
        room.apply(b, I::Ready).unwrap();
        room.apply(a, I::Raise { amount: 100 }).unwrap();
        room.apply(b, I::Call).unwrap();
        assert_eq!(room.phase(), Phase::Waiting);

        if room.player(a).unwrap().stack() == 0 {
            assert_eq!(room.player(a).unwrap().status(), SeatStatus::SittingOut);
            assert_eq!(room.apply(a, I::Ready), Err(GameError::Busted(a)));
            assert_eq!(room.player(b).unwrap().stack(), 1100);
            // the other seat alone cannot start a hand
            room.apply(b, I::Ready).unwrap();
            assert_eq!(room.phase(), Phase::Waiting);
            return;
        }
    }
    panic!("no seed in range busted the short stack");
}
