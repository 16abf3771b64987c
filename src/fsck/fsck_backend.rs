/*Define la interfaz que usan el fsck y la reparación para leer la imagen.
El backend real es `fs::Filesystem`; las pruebas usan imágenes construidas con
`mock::MockImage`, que terminan en el mismo backend.
*/

use crate::fs::{DirEntryDisk, SuperblockDisk};

use super::fsck_types::*;

pub trait FsckBackend {
    fn superblock(&self) -> &SuperblockDisk;
    fn read_inode(&self, inum: u32) -> Result<Inode, FsckError>;
    fn read_block(&self, block: u32) -> Result<&[u8], FsckError>;
    fn bitmap_bit(&self, block: u32) -> Result<bool, FsckError>;

    /// Punteros contenidos en un bloque indirecto, en orden.
    fn read_indirect(&self, block: u32) -> Result<Vec<u32>, FsckError> {
        Ok(self
            .read_block(block)?
            .chunks_exact(4)
            .map(|raw| u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            .collect())
    }
}

/// Escrituras permitidas en modo reparación: entradas de directorio y bits
/// del bitmap, nada más.
pub trait FsckBackendMut: FsckBackend {
    fn write_dirent(
        &mut self,
        block: u32,
        slot: usize,
        entry: &DirEntryDisk,
    ) -> Result<(), FsckError>;
    fn set_bitmap_bit(&mut self, block: u32) -> Result<(), FsckError>;
}
