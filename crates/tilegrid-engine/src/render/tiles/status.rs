use std::fmt;

/// Game counters shown alongside the board.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Status {
    pub screws: usize,
    pub keys: usize,
    pub ammo: usize,
    pub level: usize,
}

impl Status {
    pub const fn new(screws: usize, keys: usize, ammo: usize, level: usize) -> Self {
        Self { screws, keys, ammo, level }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "screws: {}, keys: {}, ammo: {}, level: {}",
            self.screws, self.keys, self.ammo, self.level
        )
    }
}

/// Text destination for the per-frame status line (window title, log, ...).
pub trait StatusSink {
    fn show_status(&mut self, text: &str);
}

/// Keeps the last line written.
impl StatusSink for String {
    fn show_status(&mut self, text: &str) {
        self.clear();
        self.push_str(text);
    }
}

/// Discards everything.
impl StatusSink for () {
    fn show_status(&mut self, _text: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_all_counters_in_order() {
        let s = Status::new(3, 1, 0, 2);
        assert_eq!(s.to_string(), "screws: 3, keys: 1, ammo: 0, level: 2");
    }

    #[test]
    fn default_is_all_zero() {
        assert_eq!(Status::default().to_string(), "screws: 0, keys: 0, ammo: 0, level: 0");
    }

    #[test]
    fn string_sink_keeps_latest() {
        let mut sink = String::from("stale");
        sink.show_status("screws: 1, keys: 0, ammo: 0, level: 0");
        sink.show_status("screws: 2, keys: 0, ammo: 0, level: 0");
        assert_eq!(sink, "screws: 2, keys: 0, ammo: 0, level: 0");
    }
}
