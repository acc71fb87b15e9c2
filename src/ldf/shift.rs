use crate::error::SwapError;

/// How a dynamic distribution's anchor may move between swaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ShiftMode {
    Both = 0,
    Left = 1,
    Right = 2,
    Static = 3,
}

impl TryFrom<u8> for ShiftMode {
    type Error = SwapError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(ShiftMode::Both),
            1 => Ok(ShiftMode::Left),
            2 => Ok(ShiftMode::Right),
            3 => Ok(ShiftMode::Static),
            other => Err(SwapError::InvalidParams(format!("shift mode {}", other))),
        }
    }
}

impl ShiftMode {
    /// Keep the previous anchor when the new one would move against the allowed direction.
    pub fn enforce(self, tick: i32, last_tick: i32) -> i32 {
        match self {
            ShiftMode::Right if tick < last_tick => last_tick,
            ShiftMode::Left if tick > last_tick => last_tick,
            _ => tick,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enforce() {
        assert_eq!(ShiftMode::Right.enforce(-10, 0), 0);
        assert_eq!(ShiftMode::Right.enforce(10, 0), 10);
        assert_eq!(ShiftMode::Left.enforce(10, 0), 0);
        assert_eq!(ShiftMode::Left.enforce(-10, 0), -10);
        assert_eq!(ShiftMode::Both.enforce(-10, 0), -10);
        assert_eq!(ShiftMode::Static.enforce(7, 0), 7);
    }
}
