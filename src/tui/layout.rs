//! Width breakpoints for layout decisions, kept in one place.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Breakpoint {
    /// < 80 cols: transcript only, short key hints
    Compact,
    /// 80-119 cols: narrow task sidebar
    Normal,
    /// 120+ cols
    Wide,
}

impl Breakpoint {
    pub fn from_width(width: u16) -> Self {
        match width {
            0..=79 => Breakpoint::Compact,
            80..=119 => Breakpoint::Normal,
            _ => Breakpoint::Wide,
        }
    }

    /// Task sidebar width in columns; zero hides it
    pub fn sidebar_width(&self) -> u16 {
        match self {
            Breakpoint::Compact => 0,
            Breakpoint::Normal => 28,
            Breakpoint::Wide => 36,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoint_thresholds() {
        assert_eq!(Breakpoint::from_width(40), Breakpoint::Compact);
        assert_eq!(Breakpoint::from_width(79), Breakpoint::Compact);
        assert_eq!(Breakpoint::from_width(80), Breakpoint::Normal);
        assert_eq!(Breakpoint::from_width(119), Breakpoint::Normal);
        assert_eq!(Breakpoint::from_width(120), Breakpoint::Wide);
        assert!(Breakpoint::Wide > Breakpoint::Compact);
    }

    #[test]
    fn compact_hides_sidebar() {
        assert_eq!(Breakpoint::Compact.sidebar_width(), 0);
        assert!(Breakpoint::Normal.sidebar_width() > 0);
    }
}
