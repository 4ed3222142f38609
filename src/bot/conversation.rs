//! Per-user conversation state. Each variant says what the next text message
//! from that user means.

use engine::NewUser;

use super::keyboards::SKIP_BUTTON;

/// Shortest accepted name or group, in characters.
pub const MIN_FIELD_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversation {
    Registration(RegistrationStep),
    /// The next message is a check-in code for `day`.
    AwaitingCode { day: i32 },
    /// An admin picked `day`; the next message is its code.
    AdminDayCode { day: i32 },
    AdminBroadcastText,
    AdminBroadcastConfirm { text: String },
}

/// Registration collects fields in a fixed order, carrying what it has so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStep {
    LastName,
    FirstName {
        last_name: String,
    },
    MiddleName {
        last_name: String,
        first_name: String,
    },
    Group {
        last_name: String,
        first_name: String,
        middle_name: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationTransition {
    /// Input accepted; ask for the next field.
    Advanced(RegistrationStep),
    /// Input rejected; ask for the same field again.
    Rejected(RegistrationStep),
    Completed(NewUser),
}

fn valid_field(input: &str) -> Option<String> {
    let input = input.trim();
    (input.chars().count() >= MIN_FIELD_LEN).then(|| input.to_string())
}

impl RegistrationStep {
    pub fn advance(self, user_id: i64, input: &str) -> RegistrationTransition {
        use RegistrationTransition::{Advanced, Completed, Rejected};

        match self {
            RegistrationStep::LastName => match valid_field(input) {
                Some(last_name) => Advanced(RegistrationStep::FirstName { last_name }),
                None => Rejected(RegistrationStep::LastName),
            },
            RegistrationStep::FirstName { last_name } => match valid_field(input) {
                Some(first_name) => Advanced(RegistrationStep::MiddleName {
                    last_name,
                    first_name,
                }),
                None => Rejected(RegistrationStep::FirstName { last_name }),
            },
            RegistrationStep::MiddleName {
                last_name,
                first_name,
            } => {
                let input = input.trim();
                let middle_name = (input != SKIP_BUTTON && !input.is_empty())
                    .then(|| input.to_string());
                Advanced(RegistrationStep::Group {
                    last_name,
                    first_name,
                    middle_name,
                })
            }
            RegistrationStep::Group {
                last_name,
                first_name,
                middle_name,
            } => match valid_field(input) {
                Some(group_name) => Completed(NewUser::new(
                    user_id,
                    &last_name,
                    &first_name,
                    middle_name.as_deref(),
                    &group_name,
                )),
                None => Rejected(RegistrationStep::Group {
                    last_name,
                    first_name,
                    middle_name,
                }),
            },
        }
    }
}
