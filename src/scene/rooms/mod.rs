//! Per-room scene scripts, one module each.

pub mod cargo_hold;
pub mod gangway;
pub mod graveyard;
pub mod quarterdeck;
pub mod treasure_room;

use super::RoomContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomId {
    Gangway,
    Graveyard,
    CargoHold,
    Quarterdeck,
    TreasureRoom,
}

impl RoomId {
    pub const ALL: [RoomId; 5] = [
        RoomId::Gangway,
        RoomId::Graveyard,
        RoomId::CargoHold,
        RoomId::Quarterdeck,
        RoomId::TreasureRoom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RoomId::Gangway => "gangway",
            RoomId::Graveyard => "graveyard",
            RoomId::CargoHold => "cargoHold",
            RoomId::Quarterdeck => "quarterdeck",
            RoomId::TreasureRoom => "treasureRoom",
        }
    }

    pub fn parse(name: &str) -> Option<RoomId> {
        RoomId::ALL.into_iter().find(|r| r.name().eq_ignore_ascii_case(name))
    }

    pub fn run(self, ctx: &RoomContext) {
        match self {
            RoomId::Gangway => gangway::run(ctx),
            RoomId::Graveyard => graveyard::run(ctx),
            RoomId::CargoHold => cargo_hold::run(ctx),
            RoomId::Quarterdeck => quarterdeck::run(ctx),
            RoomId::TreasureRoom => treasure_room::run(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(RoomId::parse("GANGWAY"), Some(RoomId::Gangway));
        assert_eq!(RoomId::parse("cargoHold"), Some(RoomId::CargoHold));
    }

    #[test]
    fn parse_rejects_unknown_room() {
        assert_eq!(RoomId::parse("dungeon"), None);
    }
}
