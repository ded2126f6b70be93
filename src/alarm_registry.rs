// src/alarm_registry.rs

use crate::clock::Time;

/// Future clock times at which the host wants a tick.
///
/// Stored in descending order so the most imminent alarm sits at the tail.
#[derive(Debug, Default, Clone)]
pub struct AlarmRegistry {
    alarms: Vec<Time>,
}

impl AlarmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    /// Add an alarm. Order is restored by the next [`sort`](Self::sort).
    pub fn push(&mut self, t: Time) {
        self.alarms.push(t);
    }

    pub fn sort(&mut self) {
        self.alarms.sort_by(|a, b| b.total_cmp(a));
    }

    /// The most imminent alarm.
    #[inline]
    pub fn next(&self) -> Option<Time> {
        self.alarms.last().copied()
    }

    #[inline]
    pub fn is_due(&self, now: Time) -> bool {
        self.next().is_some_and(|t| t <= now)
    }

    /// Drop every alarm at or before `now`. Returns how many fired.
    pub fn sweep(&mut self, now: Time) -> usize {
        let keep = self.alarms.partition_point(|&t| t > now);
        let fired = self.alarms.len() - keep;
        self.alarms.truncate(keep);
        fired
    }

    pub fn as_slice(&self) -> &[Time] {
        &self.alarms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alarms(times: &[Time]) -> AlarmRegistry {
        let mut registry = AlarmRegistry::new();
        for &t in times {
            registry.push(t);
        }
        registry.sort();
        registry
    }

    #[test]
    fn most_imminent_alarm_is_at_the_tail() {
        let registry = alarms(&[2.0, 0.5, 1.0]);
        assert_eq!(registry.as_slice(), &[2.0, 1.0, 0.5]);
        assert_eq!(registry.next(), Some(0.5));
    }

    #[test]
    fn due_check_uses_the_minimum() {
        let registry = alarms(&[3.0, 1.0]);
        assert!(!registry.is_due(0.9));
        assert!(registry.is_due(1.0));
    }

    #[test]
    fn sweep_removes_all_due_alarms() {
        let mut registry = alarms(&[0.5, 1.0, 1.0, 2.0]);
        assert_eq!(registry.sweep(1.0), 3);
        assert_eq!(registry.as_slice(), &[2.0]);
        assert_eq!(registry.sweep(1.5), 0);
        assert_eq!(registry.sweep(5.0), 1);
        assert!(registry.is_empty());
        assert!(!registry.is_due(10.0));
    }
}
