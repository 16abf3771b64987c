/*Reparación: reengancha en `lost_found` cada inodo en uso que ningún
directorio nombra. No corrige nada más. Las escrituras van al buffer del
backend; si falla a mitad, lo ya escrito se queda escrito. */

use log::{debug, info};

use super::fsck::check_dir_format;
use super::fsck_backend::{FsckBackend, FsckBackendMut};
use super::fsck_types::*;
use crate::dir;
use crate::fs::{DirEntryDisk, LOST_FOUND_NAME, ROOTINO};

/// Relleno del nombre de las entradas creadas por la reparación.
pub const RECOVERY_PLACEHOLDER: u8 = b'L';

/// Inodo de `lost_found`, buscado entre las entradas de la raíz.
pub fn find_lost_found<B: FsckBackend>(backend: &B) -> Result<(u32, Inode), FsckError> {
    if backend.superblock().ninodes <= ROOTINO {
        return Err(FsckError::RecoveryDirectoryMissing);
    }
    let root = backend.read_inode(ROOTINO)?;
    if !root.is_dir() {
        return Err(FsckError::RecoveryDirectoryMissing);
    }

    let (_, _, entry) = dir::find_entry(backend, &root, LOST_FOUND_NAME)?
        .ok_or(FsckError::RecoveryDirectoryMissing)?;
    let inum = u32::from(entry.inum);
    if inum >= backend.superblock().ninodes {
        return Err(FsckError::RecoveryDirectoryMissing);
    }

    let inode = backend.read_inode(inum)?;
    if !inode.is_dir() {
        return Err(FsckError::RecoveryDirectoryMissing);
    }
    Ok((inum, inode))
}

/// Inodos en uso sin ninguna entrada de directorio, en orden.
pub fn find_orphans<B: FsckBackend>(backend: &B) -> Result<Vec<u32>, FsckError> {
    let ninodes = backend.superblock().ninodes;
    let mut dir_refs = vec![0u32; ninodes as usize];
    dir_refs[ROOTINO as usize] = 1;
    check_dir_format(backend, &mut dir_refs)?;

    let mut orphans = Vec::new();
    // el inodo 0 está reservado: una entrada con inum 0 es un hueco libre
    for inum in ROOTINO..ninodes {
        if dir_refs[inum as usize] == 0 && backend.read_inode(inum)?.is_allocated() {
            orphans.push(inum);
        }
    }
    Ok(orphans)
}

pub fn run_repair<B: FsckBackendMut>(backend: &mut B) -> Result<RepairReport, FsckError> {
    let mut report = RepairReport::default();

    // --- Paso 1: localizar lost_found ---
    let (lost_found, lf_inode) = find_lost_found(&*backend)?;
    debug!("lost_found es el inodo {}", lost_found);

    // --- Paso 2: recalcular referencias ---
    let orphans = find_orphans(&*backend)?;
    debug!("{} inodos huérfanos: {:?}", orphans.len(), orphans);

    // --- Paso 3: una entrada nueva por huérfano ---
    for inum in orphans {
        let (block, slot) = dir::find_free_slot(&*backend, &lf_inode)?
            .ok_or(FsckError::RecoveryDirectoryFull { inum })?;
        let short = u16::try_from(inum).map_err(|_| FsckError::InodeNumberTooLarge { inum })?;

        backend.write_dirent(block, slot, &DirEntryDisk::new(short, &[RECOVERY_PLACEHOLDER]))?;
        if !backend.bitmap_bit(block)? {
            backend.set_bitmap_bit(block)?;
            report.bitmap_bits_set.push(block);
        }

        info!(
            "inodo {} enlazado en lost_found (bloque {}, entrada {})",
            inum, block, slot
        );
        report.reattached.push(inum);
    }

    Ok(report)
}
