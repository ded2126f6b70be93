// src/observer.rs

use crate::event::Notification;

/// Receives scheduler notifications.
///
/// Called synchronously from `apply` and `update`; implementations must
/// return quickly.
pub trait Observer {
    fn notify(&mut self, notification: Notification);
}

/// Collects notifications for the host to drain.
impl Observer for Vec<Notification> {
    fn notify(&mut self, notification: Notification) {
        self.push(notification);
    }
}

/// Discards notifications.
impl Observer for () {
    fn notify(&mut self, _notification: Notification) {}
}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn notify(&mut self, notification: Notification) {
        (**self).notify(notification);
    }
}
