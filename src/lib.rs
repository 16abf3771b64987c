pub mod dir;
pub mod fs;
pub mod fsck;

pub use crate::fs::{
    DirEntryDisk, Filesystem, Image, InodeDisk, SuperblockDisk, BSIZE, DIRSIZ, LOST_FOUND_NAME,
    NDIRECT, NINDIRECT, ROOTINO,
};
pub use crate::fsck::fsck::run_fsck;
pub use crate::fsck::fsck_types::{FsckError, FsckReport, RepairReport};
pub use crate::fsck::repair::run_repair;
