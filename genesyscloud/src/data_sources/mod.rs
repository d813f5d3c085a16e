pub mod trunkbasesettings;

pub use trunkbasesettings::TrunkBaseSettingsDataSource;
