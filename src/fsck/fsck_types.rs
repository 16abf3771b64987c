/*Tipos compartidos por el fsck y la reparación:
errores (uno por invariante), la vista decodificada de inodos y entradas de
directorio, las tablas de trabajo (logs) y los reportes finales. */

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::fs::{DirEntryDisk, InodeDisk, SuperblockDisk, DIRSIZ, NDIRECT, T_DEV, T_DIR, T_FILE};

// -----------------------------------------------------------------------------
// Errores
// -----------------------------------------------------------------------------

/// El texto de cada variante es el diagnóstico fijo que se imprime tras
/// `ERROR: `; los campos sólo se usan para el log de depuración.
#[derive(Debug, Error)]
pub enum FsckError {
    #[error("bad inode.")]
    BadInode { inum: u32, raw_type: i16 },
    #[error("bad direct address in inode.")]
    BadDirectAddress { inum: u32, block: u32 },
    #[error("bad indirect address in inode.")]
    BadIndirectAddress { inum: u32, block: u32 },
    #[error("root directory does not exist.")]
    RootMissingOrMalformed,
    #[error("directory not properly formatted.")]
    DirectoryMalformed { inum: u32 },
    #[error("parent directory mismatch.")]
    ParentMismatch { inum: u32, parent: u32 },
    #[error("address used by inode but marked free in bitmap.")]
    AddressNotInBitmap { inum: u32, block: u32 },
    #[error("bitmap marks block in use but it is not in use.")]
    BitmapMarksUnusedBlock { block: u32 },
    #[error("direct address used more than once.")]
    DuplicateDirectAddress { block: u32 },
    #[error("indirect address used more than once.")]
    DuplicateIndirectAddress { block: u32 },
    #[error("inode marked use but not found in a directory.")]
    InodeUnreferenced { inum: u32 },
    #[error("inode reffered to in directory but marked free.")]
    DirectoryReferenceMismatch { inum: u32 },
    #[error("bad reference count for file.")]
    BadFileLinkCount { inum: u32, nlink: i16, refs: u32 },
    #[error("directory appears more than once in file system.")]
    DirectoryMultiplyLinked { inum: u32, refs: u32 },

    // Sólo en modo reparación
    #[error("lost_found directory does not exist.")]
    RecoveryDirectoryMissing,
    #[error("lost_found directory is full.")]
    RecoveryDirectoryFull { inum: u32 },
    #[error("inode {inum} cannot be named by a 16-bit directory entry.")]
    InodeNumberTooLarge { inum: u32 },

    // Fallos de acceso, distintos de las violaciones estructurales
    #[error("image is corrupt: bytes {offset}..{end} lie outside the {len}-byte image")]
    CorruptImage { offset: u64, end: u64, len: usize },
    #[error("image is opened read-only")]
    ReadOnly,
    #[error("cannot access image {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FsckError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// `true` para las violaciones de invariantes; `false` para fallos de
    /// E/S, imágenes truncadas o uso indebido.
    pub fn is_violation(&self) -> bool {
        !matches!(
            self,
            Self::CorruptImage { .. } | Self::ReadOnly | Self::Io { .. }
        )
    }
}

// -----------------------------------------------------------------------------
// Vistas decodificadas
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeType {
    Free,
    Dir,
    File,
    Device,
}

impl InodeType {
    pub fn from_raw(raw: i16) -> Option<Self> {
        match raw {
            0 => Some(Self::Free),
            T_DIR => Some(Self::Dir),
            T_FILE => Some(Self::File),
            T_DEV => Some(Self::Device),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub raw_type: i16,
    pub major: i16,
    pub minor: i16,
    pub nlink: i16,
    pub size: u32,
    pub direct: [u32; NDIRECT],
    pub indirect: u32,
}

impl Inode {
    /// `None` si el tipo en disco no es ninguno de los válidos.
    pub fn kind(&self) -> Option<InodeType> {
        InodeType::from_raw(self.raw_type)
    }

    pub fn is_allocated(&self) -> bool {
        self.raw_type != 0
    }

    pub fn is_dir(&self) -> bool {
        self.raw_type == T_DIR
    }

    pub fn is_file(&self) -> bool {
        self.raw_type == T_FILE
    }
}

impl From<InodeDisk> for Inode {
    fn from(disk: InodeDisk) -> Self {
        let mut direct = [0u32; NDIRECT];
        direct.copy_from_slice(&disk.addrs[..NDIRECT]);
        Self {
            raw_type: disk.file_type,
            major: disk.major,
            minor: disk.minor,
            nlink: disk.nlink,
            size: disk.size,
            direct,
            indirect: disk.addrs[NDIRECT],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dirent {
    pub inum: u16,
    pub name: [u8; DIRSIZ],
}

impl Dirent {
    /// Hueco libre (inodo 0).
    pub fn is_empty(&self) -> bool {
        self.inum == 0
    }

    /// Bytes del nombre hasta el primer NUL, o los `DIRSIZ` completos.
    pub fn name_bytes(&self) -> &[u8] {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(DIRSIZ);
        &self.name[..end]
    }

    pub fn name_is(&self, name: &str) -> bool {
        self.name_bytes() == name.as_bytes()
    }

    pub fn is_dot(&self) -> bool {
        self.name_is(".")
    }

    pub fn is_dotdot(&self) -> bool {
        self.name_is("..")
    }
}

impl From<DirEntryDisk> for Dirent {
    fn from(disk: DirEntryDisk) -> Self {
        Self {
            inum: disk.inum,
            name: disk.name,
        }
    }
}

// -----------------------------------------------------------------------------
// Logs de trabajo
// -----------------------------------------------------------------------------

/// Tablas derivadas de una sola pasada. Las de bloques se indexan por
/// `bloque - data_start`; las de inodos por número de inodo.
#[derive(Debug, Clone)]
pub struct ScratchLogs {
    pub data_start: u32,
    pub block_claimed: Vec<bool>,
    pub direct_refs: Vec<u32>,
    pub indirect_refs: Vec<u32>,
    pub inode_allocated: Vec<bool>,
    pub dir_refs: Vec<u32>,
}

impl ScratchLogs {
    pub fn new(sb: &SuperblockDisk) -> Self {
        let nblocks = sb.data_block_count() as usize;
        let ninodes = sb.ninodes as usize;
        Self {
            data_start: sb.data_start(),
            block_claimed: vec![false; nblocks],
            direct_refs: vec![0; nblocks],
            indirect_refs: vec![0; nblocks],
            inode_allocated: vec![false; ninodes],
            dir_refs: vec![0; ninodes],
        }
    }

    /// Índice en las tablas de bloques; el llamador ya validó el rango.
    pub fn data_index(&self, block: u32) -> usize {
        (block - self.data_start) as usize
    }

    pub fn data_block(&self, index: usize) -> u32 {
        self.data_start + index as u32
    }

    pub fn claim_direct(&mut self, block: u32) {
        let idx = self.data_index(block);
        self.block_claimed[idx] = true;
        self.direct_refs[idx] += 1;
    }

    pub fn claim_indirect(&mut self, block: u32) {
        let idx = self.data_index(block);
        self.block_claimed[idx] = true;
        self.indirect_refs[idx] += 1;
    }
}

// -----------------------------------------------------------------------------
// Reportes
// -----------------------------------------------------------------------------

/// Resumen de una imagen que pasó las doce comprobaciones.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FsckReport {
    pub inodes_in_use: u32,
    pub directories: u32,
    pub files: u32,
    pub devices: u32,
    pub data_blocks_in_use: u32,
}

/// Lo que hizo una reparación completa.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepairReport {
    /// Inodos enlazados en `lost_found`, en orden.
    pub reattached: Vec<u32>,
    /// Bloques cuyo bit del bitmap hubo que encender.
    pub bitmap_bits_set: Vec<u32>,
}

impl RepairReport {
    pub fn is_noop(&self) -> bool {
        self.reattached.is_empty()
    }
}
