pub mod appsettings;
pub mod clock;
pub mod delivery;
pub mod storage;
pub mod subscription;
pub mod workflow;

#[cfg(test)]
mod test_utils;
