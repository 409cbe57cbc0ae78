//! Delivers ride transition notices as messages

use tracing::{error, warn};

use crate::{
    booking::Transition,
    booking_service::Notifier,
    models::Ride,
    notifications,
    repositories::{MessageRepository, UserDirectory},
};

/// Writes the notices of a committed transition in a detached task
#[derive(Clone)]
pub struct MessageNotifier {
    users: UserDirectory,
    messages: MessageRepository,
}

impl MessageNotifier {
    pub fn new(users: UserDirectory, messages: MessageRepository) -> Self {
        Self { users, messages }
    }
}

impl Notifier for MessageNotifier {
    fn notify(&self, transition: &Transition, ride: &Ride) {
        let notifier = self.clone();
        let transition = transition.clone();
        let ride = ride.clone();

        tokio::spawn(async move {
            let mut ids = transition.passengers();
            ids.push(ride.driver_id);

            let contacts = match notifier.users.contacts(&ids).await {
                Ok(contacts) => contacts,
                Err(e) => {
                    warn!("Sending ride {} notices without contacts: {}", ride.id, e);
                    Default::default()
                }
            };

            for message in notifications::compose(&transition, &ride, &contacts) {
                if let Err(e) = notifier.messages.create(&message).await {
                    error!(
                        "Failed to notify {} about ride {}: {}",
                        message.recipient_id, ride.id, e
                    );
                }
            }
        });
    }
}
