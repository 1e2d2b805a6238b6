pub mod batch;
pub mod calibration;
pub mod channel;
pub mod codec;
pub mod consts;
pub mod error;
pub mod experiment;
pub mod preferences;
pub mod selection;
pub mod settings;
pub mod transition;
