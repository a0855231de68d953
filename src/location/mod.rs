mod location;
mod home;

pub use self::location::Location;
pub use self::home::HomeLocation;
