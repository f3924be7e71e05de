use crate::job::JobKind;

/// ctrl-c as delivered in raw mode
pub const CTRL_C: char = '\u{3}';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    None,
    Select(usize),
    Info(usize),
    Start(usize, JobKind),
    Stop(usize),
    Quit,
}

/// Selection state machine. Device indices are 0-based; the operator types
/// them 1-based.
pub struct Dispatcher {
    selected: Option<usize>,
    devices: usize,
    quit_enabled: bool,
}

impl Dispatcher {
    pub fn new(devices: usize, quit_enabled: bool) -> Self {
        Self{
            selected: None,
            devices,
            quit_enabled,
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn quit_enabled(&self) -> bool {
        self.quit_enabled
    }

    pub fn handle(&mut self, key: char) -> Action {
        if key == CTRL_C && self.quit_enabled {
            return Action::Quit;
        }
        if let Some(d) = key.to_digit(10) {
            let d = d as usize;
            if d >= 1 && d <= self.devices {
                self.selected = Some(d - 1);
                return Action::Select(d - 1);
            }
            return Action::None;
        }

        let dev = match self.selected {
            Some(dev) => dev,
            None => return Action::None,
        };
        let action = match key.to_ascii_lowercase() {
            'i' => Action::Info(dev),
            'v' => Action::Start(dev, JobKind::Verify),
            'e' => Action::Start(dev, JobKind::Erase),
            'r' => Action::Start(dev, JobKind::ShortSelfTest),
            'l' => Action::Start(dev, JobKind::LongSelfTest),
            's' => Action::Stop(dev),
            'q' if self.quit_enabled => Action::Quit,
            _ => return Action::None,
        };
        self.selected = None;
        action
    }
}
