use time::{macros::format_description, OffsetDateTime, UtcOffset};

/// Source of "today" as a day label, e.g. `Friday, October 16, 2026`.
pub trait Clock: Send + Sync {
    fn today(&self) -> String;
}

pub fn day_label(at: OffsetDateTime) -> String {
    let fmt = format_description!("[weekday], [month repr:long] [day padding:none], [year]");
    // The description above only uses components every OffsetDateTime has.
    at.format(&fmt).unwrap_or_else(|_| at.date().to_string())
}

/// Wall clock shifted to a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn today(&self) -> String {
        day_label(OffsetDateTime::now_utc().to_offset(self.offset))
    }
}

/// Clock pinned to a label; can be moved to another day.
#[derive(Debug, Default)]
pub struct FixedClock {
    label: std::sync::RwLock<String>,
}

impl FixedClock {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: std::sync::RwLock::new(label.into()),
        }
    }

    pub fn set(&self, label: impl Into<String>) {
        if let Ok(mut current) = self.label.write() {
            *current = label.into();
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> String {
        self.label
            .read()
            .map(|l| l.clone())
            .unwrap_or_default()
    }
}
