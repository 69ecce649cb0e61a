pub mod accept;
pub mod cancel;
pub mod codes;
pub mod offer;
pub mod verify;
