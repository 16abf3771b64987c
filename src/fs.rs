use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::mem;
use std::ops::Range;
use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use log::{debug, info};

use crate::fsck::fsck_backend::{FsckBackend, FsckBackendMut};
use crate::fsck::fsck_types::{FsckError, Inode};

// -----------------------------------------------------------------------------
// Constantes del formato xv6
// -----------------------------------------------------------------------------

pub const BSIZE: usize = 512;
pub const ROOTINO: u32 = 1;
pub const SUPERBLOCK_BLOCK: u32 = 1;

pub const NDIRECT: usize = 12;
pub const NINDIRECT: usize = BSIZE / mem::size_of::<u32>();
pub const DIRSIZ: usize = 14;

pub const T_DIR: i16 = 1;
pub const T_FILE: i16 = 2;
pub const T_DEV: i16 = 3;

pub const INODE_SIZE: usize = mem::size_of::<InodeDisk>();
pub const DIRENT_SIZE: usize = mem::size_of::<DirEntryDisk>();
pub const DIRENTS_PER_BLOCK: usize = BSIZE / DIRENT_SIZE;

/// Nombre del directorio de recuperación dentro de la raíz.
pub const LOST_FOUND_NAME: &str = "lost_found";

// -------------------- Estructuras en disco --------------------
// Todo el disco es little-endian; `from_le` deja los campos en el orden del host.

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SuperblockDisk {
    pub size: u32,
    pub nblocks: u32,
    pub ninodes: u32,
    pub nlog: u32,
    pub logstart: u32,
    pub inodestart: u32,
    pub bmapstart: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct InodeDisk {
    pub file_type: i16,
    pub major: i16,
    pub minor: i16,
    pub nlink: i16,
    pub size: u32,
    /// `NDIRECT` punteros directos seguidos del puntero indirecto.
    pub addrs: [u32; NDIRECT + 1],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DirEntryDisk {
    pub inum: u16,
    pub name: [u8; DIRSIZ],
}

impl SuperblockDisk {
    pub fn from_le(self) -> Self {
        Self {
            size: u32::from_le(self.size),
            nblocks: u32::from_le(self.nblocks),
            ninodes: u32::from_le(self.ninodes),
            nlog: u32::from_le(self.nlog),
            logstart: u32::from_le(self.logstart),
            inodestart: u32::from_le(self.inodestart),
            bmapstart: u32::from_le(self.bmapstart),
        }
    }

    pub fn to_le(self) -> Self {
        // el intercambio de bytes es su propia inversa
        self.from_le()
    }

    /// Primer bloque de datos: `size - nblocks`.
    pub fn data_start(&self) -> u32 {
        self.size.saturating_sub(self.nblocks)
    }

    pub fn data_block_count(&self) -> u32 {
        self.size - self.data_start()
    }

    pub fn is_data_block(&self, block: u32) -> bool {
        block >= self.data_start() && block < self.size
    }

    pub fn inode_offset(&self, inum: u32) -> u64 {
        block_offset(self.inodestart) + u64::from(inum) * INODE_SIZE as u64
    }

    /// Byte del bitmap que contiene el bit de `block` y la posición del bit.
    pub fn bitmap_position(&self, block: u32) -> (u64, u8) {
        (
            block_offset(self.bmapstart) + u64::from(block / 8),
            (block % 8) as u8,
        )
    }
}

impl InodeDisk {
    pub fn from_le(mut self) -> Self {
        self.file_type = i16::from_le(self.file_type);
        self.major = i16::from_le(self.major);
        self.minor = i16::from_le(self.minor);
        self.nlink = i16::from_le(self.nlink);
        self.size = u32::from_le(self.size);
        for addr in &mut self.addrs {
            *addr = u32::from_le(*addr);
        }
        self
    }

    pub fn to_le(self) -> Self {
        self.from_le()
    }
}

impl DirEntryDisk {
    /// Construye una entrada; el nombre se trunca a `DIRSIZ` y se rellena con NUL.
    pub fn new(inum: u16, name: &[u8]) -> Self {
        let mut raw = [0u8; DIRSIZ];
        let len = name.len().min(DIRSIZ);
        raw[..len].copy_from_slice(&name[..len]);
        Self { inum, name: raw }
    }

    pub fn from_le(self) -> Self {
        Self {
            inum: u16::from_le(self.inum),
            name: self.name,
        }
    }

    pub fn to_le(self) -> Self {
        self.from_le()
    }
}

/// Desplazamiento en bytes del bloque `block`.
pub fn block_offset(block: u32) -> u64 {
    u64::from(block) * BSIZE as u64
}

// -----------------------------------------------------------------------------
// Acceso a la imagen
// -----------------------------------------------------------------------------

/// Imagen de disco cargada completa en memoria.
///
/// En modo lectura/escritura conserva el descriptor abierto durante toda la
/// ejecución; se libera al soltar la imagen, también en las salidas por error.
/// Nadie más debe tocar el archivo mientras tanto: no hay bloqueo.
#[derive(Debug)]
pub struct Image {
    path: Option<PathBuf>,
    file: Option<File>,
    data: Vec<u8>,
    writable: bool,
    dirty: bool,
}

impl Image {
    /// Abre la imagen sólo para lectura (modo `check`).
    pub fn open(path: &Path) -> Result<Self, FsckError> {
        let data = std::fs::read(path).map_err(|source| FsckError::io(path, source))?;
        debug!("imagen {:?} cargada ({} bytes, sólo lectura)", path, data.len());
        Ok(Self {
            path: Some(path.to_path_buf()),
            file: None,
            data,
            writable: false,
            dirty: false,
        })
    }

    /// Abre la imagen para lectura y escritura en el mismo archivo (modo `repair`).
    pub fn open_rw(path: &Path) -> Result<Self, FsckError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| FsckError::io(path, source))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|source| FsckError::io(path, source))?;
        debug!("imagen {:?} cargada ({} bytes, lectura/escritura)", path, data.len());

        Ok(Self {
            path: Some(path.to_path_buf()),
            file: Some(file),
            data,
            writable: true,
            dirty: false,
        })
    }

    /// Imagen sin archivo detrás; `flush` sólo limpia la marca de sucio.
    pub fn from_bytes(data: Vec<u8>, writable: bool) -> Self {
        Self {
            path: None,
            file: None,
            data,
            writable,
            dirty: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn range(&self, offset: u64, len: usize) -> Result<Range<usize>, FsckError> {
        let corrupt = || FsckError::CorruptImage {
            offset,
            end: offset.saturating_add(len as u64),
            len: self.data.len(),
        };
        let start = usize::try_from(offset).map_err(|_| corrupt())?;
        let end = start.checked_add(len).ok_or_else(corrupt)?;
        if end > self.data.len() {
            return Err(corrupt());
        }
        Ok(start..end)
    }

    /// `len` bytes desde `offset`, validados contra el tamaño de la imagen.
    pub fn slice(&self, offset: u64, len: usize) -> Result<&[u8], FsckError> {
        let range = self.range(offset, len)?;
        Ok(&self.data[range])
    }

    pub fn slice_mut(&mut self, offset: u64, len: usize) -> Result<&mut [u8], FsckError> {
        if !self.writable {
            return Err(FsckError::ReadOnly);
        }
        let range = self.range(offset, len)?;
        self.dirty = true;
        Ok(&mut self.data[range])
    }

    /// Escribe el buffer completo de vuelta al archivo, en el sitio.
    pub fn flush(&mut self) -> Result<(), FsckError> {
        if !self.dirty {
            return Ok(());
        }

        if let (Some(file), Some(path)) = (self.file.as_mut(), self.path.as_ref()) {
            file.seek(SeekFrom::Start(0))
                .and_then(|_| file.write_all(&self.data))
                .and_then(|_| file.sync_all())
                .map_err(|source| FsckError::io(path, source))?;
            info!("imagen {:?} actualizada en disco", path);
        }

        self.dirty = false;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Extractor de metadatos
// -----------------------------------------------------------------------------

/// Imagen más su superblock ya decodificado.
#[derive(Debug)]
pub struct Filesystem {
    image: Image,
    superblock: SuperblockDisk,
}

impl Filesystem {
    /// Decodifica el superblock (bloque 1). No valida sus campos: el productor
    /// de la imagen garantiza que son coherentes.
    pub fn load(image: Image) -> Result<Self, FsckError> {
        let raw = image.slice(
            block_offset(SUPERBLOCK_BLOCK),
            mem::size_of::<SuperblockDisk>(),
        )?;
        let superblock = bytemuck::pod_read_unaligned::<SuperblockDisk>(raw).from_le();
        debug!("superblock: {:?}", superblock);

        Ok(Self { image, superblock })
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn into_image(self) -> Image {
        self.image
    }

    pub fn flush(&mut self) -> Result<(), FsckError> {
        self.image.flush()
    }
}

impl FsckBackend for Filesystem {
    fn superblock(&self) -> &SuperblockDisk {
        &self.superblock
    }

    fn read_inode(&self, inum: u32) -> Result<Inode, FsckError> {
        let raw = self
            .image
            .slice(self.superblock.inode_offset(inum), INODE_SIZE)?;
        Ok(Inode::from(
            bytemuck::pod_read_unaligned::<InodeDisk>(raw).from_le(),
        ))
    }

    fn read_block(&self, block: u32) -> Result<&[u8], FsckError> {
        self.image.slice(block_offset(block), BSIZE)
    }

    fn bitmap_bit(&self, block: u32) -> Result<bool, FsckError> {
        let (offset, bit) = self.superblock.bitmap_position(block);
        let byte = self.image.slice(offset, 1)?[0];
        Ok((byte >> bit) & 1 == 1)
    }
}

impl FsckBackendMut for Filesystem {
    fn write_dirent(
        &mut self,
        block: u32,
        slot: usize,
        entry: &DirEntryDisk,
    ) -> Result<(), FsckError> {
        debug_assert!(slot < DIRENTS_PER_BLOCK);
        let offset = block_offset(block) + (slot * DIRENT_SIZE) as u64;
        let dst = self.image.slice_mut(offset, DIRENT_SIZE)?;
        dst.copy_from_slice(bytemuck::bytes_of(&entry.to_le()));
        Ok(())
    }

    fn set_bitmap_bit(&mut self, block: u32) -> Result<(), FsckError> {
        let (offset, bit) = self.superblock.bitmap_position(block);
        self.image.slice_mut(offset, 1)?[0] |= 1 << bit;
        Ok(())
    }
}
