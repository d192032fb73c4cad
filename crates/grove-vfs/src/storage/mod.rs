//! Policy-aware storage primitives.

mod cow;
mod ops;
mod policy;

pub(crate) use cow::{append_contents, clone_file};
pub(crate) use ops::{
    copy_file, create_dir, create_file_from_temp, move_dir, move_file, Placed, STAGING_PREFIX,
};
