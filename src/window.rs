/// Identifies a top-level window by its native `HWND` value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowId {
    handle: isize,
}

impl WindowId {
    pub const fn from_raw_handle(raw_handle: isize) -> Self {
        Self { handle: raw_handle }
    }

    pub const fn raw_handle(&self) -> isize {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_id_round_trips_the_raw_handle() {
        let window = WindowId::from_raw_handle(0x00a1_04b2);
        assert_eq!(window.raw_handle(), 0x00a1_04b2);
    }
}
