//! Symbolic channel name resolution.
//!
//! Two tables (primary/secondary device) map a symbolic name to a physical
//! channel index or stereo pair plus a gain. Grounded on
//! `control/audio_manager.py`'s `named_channels` dict, extended to the
//! dual-table / stereo-pair shape the latest design requires.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy)]
pub enum ChannelTarget {
    Mono(usize),
    Stereo(usize, usize),
}

#[derive(Debug, Clone, Copy)]
pub struct ChannelEntry {
    pub target: ChannelTarget,
    pub gain: f32,
}

impl ChannelEntry {
    pub fn mono(index: usize, gain: f32) -> Self {
        Self {
            target: ChannelTarget::Mono(index),
            gain,
        }
    }

    pub fn stereo_pair(left: usize, right: usize, gain: f32) -> Self {
        Self {
            target: ChannelTarget::Stereo(left, right),
            gain,
        }
    }
}

pub struct ChannelTable {
    device: Device,
    entries: HashMap<String, ChannelEntry>,
}

impl ChannelTable {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, entry: ChannelEntry) {
        self.entries.insert(name.to_string(), entry);
    }

    fn lookup(&self, name: &str) -> Option<(Device, ChannelEntry)> {
        if let Some(e) = self.entries.get(name) {
            return Some((self.device, *e));
        }

        // `stereo_<name>` as a single paired entry.
        let stereo_key = format!("stereo_{name}");
        if let Some(e) = self.entries.get(&stereo_key) {
            return Some((self.device, *e));
        }

        // Split `stereo_<name>_L` / `stereo_<name>_R` keys.
        let l_key = format!("stereo_{name}_L");
        let r_key = format!("stereo_{name}_R");
        if let (Some(l), Some(r)) = (self.entries.get(&l_key), self.entries.get(&r_key)) {
            let (l_idx, r_idx) = match (l.target, r.target) {
                (ChannelTarget::Mono(li), ChannelTarget::Mono(ri)) => (li, ri),
                _ => return None,
            };
            return Some((
                self.device,
                ChannelEntry::stereo_pair(l_idx, r_idx, l.gain),
            ));
        }

        None
    }
}

pub struct ChannelMap {
    primary: ChannelTable,
    secondary: ChannelTable,
}

#[derive(Debug, Clone, Copy)]
pub struct Resolved {
    pub device: Device,
    pub target: ChannelTarget,
    pub gain: f32,
}

impl ChannelMap {
    pub fn new(primary: ChannelTable, secondary: ChannelTable) -> Self {
        Self { primary, secondary }
    }

    /// Resolve a symbolic name, checking the primary table first, then
    /// the secondary.
    pub fn resolve(&self, name: &str) -> Option<Resolved> {
        self.primary
            .lookup(name)
            .or_else(|| self.secondary.lookup(name))
            .map(|(device, entry)| Resolved {
                device,
                target: entry.target,
                gain: entry.gain,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> ChannelTable {
        let mut t = ChannelTable::new(Device::Primary);
        t.insert("gangway", ChannelEntry::mono(0, 1.0));
        t.insert("stereo_mainHall", ChannelEntry::stereo_pair(2, 3, 1.0));
        t.insert("stereo_attic_L", ChannelEntry::mono(4, 0.8));
        t.insert("stereo_attic_R", ChannelEntry::mono(5, 0.8));
        t
    }

    #[test]
    fn resolves_mono_target() {
        let map = ChannelMap::new(sample_table(), ChannelTable::new(Device::Secondary));
        let r = map.resolve("gangway").unwrap();
        match r.target {
            ChannelTarget::Mono(idx) => assert_eq!(idx, 0),
            _ => panic!("expected mono"),
        }
    }

    #[test]
    fn resolves_combined_stereo_key() {
        let map = ChannelMap::new(sample_table(), ChannelTable::new(Device::Secondary));
        let r = map.resolve("mainHall").unwrap();
        match r.target {
            ChannelTarget::Stereo(l, r2) => assert_eq!((l, r2), (2, 3)),
            _ => panic!("expected stereo"),
        }
    }

    #[test]
    fn resolves_split_lr_keys() {
        let map = ChannelMap::new(sample_table(), ChannelTable::new(Device::Secondary));
        let r = map.resolve("attic").unwrap();
        match r.target {
            ChannelTarget::Stereo(l, r2) => assert_eq!((l, r2), (4, 5)),
            _ => panic!("expected stereo"),
        }
    }

    #[test]
    fn falls_back_to_secondary() {
        let mut secondary = ChannelTable::new(Device::Secondary);
        secondary.insert("dungeon", ChannelEntry::mono(1, 1.0));
        let map = ChannelMap::new(sample_table(), secondary);
        let r = map.resolve("dungeon").unwrap();
        assert_eq!(r.device, Device::Secondary);
    }

    #[test]
    fn unknown_name_is_none() {
        let map = ChannelMap::new(sample_table(), ChannelTable::new(Device::Secondary));
        assert!(map.resolve("nope").is_none());
    }
}
