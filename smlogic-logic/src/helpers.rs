use smlogic_game::Capacity;

/// Suits that count toward damage reduction. Removed suits are never set.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Suits {
    pub varia: bool,
    pub gravity: bool,
}

pub fn suit_damage_factor(suits: Suits) -> Capacity {
    if suits.gravity && suits.varia {
        4
    } else if suits.gravity || suits.varia {
        2
    } else {
        1
    }
}

/// Damage of one enemy or environment hit after suit reduction. A damaging hit does at least 1.
pub fn reduced_hit_damage(base_damage: Capacity, suits: Suits) -> Capacity {
    if base_damage <= 0 {
        return 0;
    }
    Capacity::max(1, base_damage / suit_damage_factor(suits))
}

pub fn heat_frames_energy(frames: Capacity, suits: Suits, multiplier: f32) -> Capacity {
    if suits.varia {
        0
    } else {
        (frames as f32 * multiplier / 4.0).ceil() as Capacity
    }
}

pub fn lava_frames_energy(frames: Capacity, suits: Suits, multiplier: f32) -> Capacity {
    if suits.gravity && suits.varia {
        0
    } else if suits.gravity || suits.varia {
        (frames as f32 * multiplier / 4.0).ceil() as Capacity
    } else {
        (frames as f32 * multiplier / 2.0).ceil() as Capacity
    }
}

pub fn acid_frames_energy(frames: Capacity, suits: Suits, multiplier: f32) -> Capacity {
    (frames as f32 * multiplier * 1.5 / suit_damage_factor(suits) as f32).ceil() as Capacity
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITLESS: Suits = Suits {
        varia: false,
        gravity: false,
    };
    const VARIA: Suits = Suits {
        varia: true,
        gravity: false,
    };
    const BOTH: Suits = Suits {
        varia: true,
        gravity: true,
    };

    #[test]
    fn test_suit_reduction() {
        assert_eq!(reduced_hit_damage(20, SUITLESS), 20);
        assert_eq!(reduced_hit_damage(20, VARIA), 10);
        assert_eq!(reduced_hit_damage(20, BOTH), 5);
        assert_eq!(reduced_hit_damage(2, BOTH), 1);
    }

    #[test]
    fn test_environment_energy() {
        assert_eq!(heat_frames_energy(100, SUITLESS, 1.0), 25);
        assert_eq!(heat_frames_energy(100, VARIA, 1.0), 0);
        assert_eq!(heat_frames_energy(101, SUITLESS, 1.0), 26);
        assert_eq!(heat_frames_energy(100, SUITLESS, 1.5), 38);
        assert_eq!(lava_frames_energy(60, SUITLESS, 1.0), 30);
        assert_eq!(lava_frames_energy(60, VARIA, 1.0), 15);
        assert_eq!(lava_frames_energy(60, BOTH, 1.0), 0);
        assert_eq!(acid_frames_energy(60, SUITLESS, 1.0), 90);
        assert_eq!(acid_frames_energy(60, BOTH, 1.0), 23);
    }
}
