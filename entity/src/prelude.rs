pub use super::email::Entity as Email;
pub use super::key_point::Entity as KeyPoint;
pub use super::preference::Entity as Preference;
pub use super::statistics::Entity as Statistics;
pub use super::user::Entity as User;
