// src/dir.rs
use log::trace;

use crate::fs::{DirEntryDisk, DIRENT_SIZE, NDIRECT};
use crate::fsck::fsck_backend::FsckBackend;
use crate::fsck::fsck_types::{Dirent, FsckError, Inode};

/// Secuencia perezosa de los bloques de datos de un directorio: primero los
/// punteros directos no nulos, luego los no nulos del bloque indirecto.
///
/// El bloque indirecto se lee sólo cuando hace falta. Tras el primer error la
/// secuencia termina; no se puede reiniciar.
pub struct DirBlocks<'a, B: FsckBackend + ?Sized> {
    backend: &'a B,
    direct: [u32; NDIRECT],
    indirect: u32,
    next_direct: usize,
    pointers: Option<Vec<u32>>,
    next_indirect: usize,
    done: bool,
}

impl<'a, B: FsckBackend + ?Sized> DirBlocks<'a, B> {
    pub fn new(backend: &'a B, inode: &Inode) -> Self {
        Self {
            backend,
            direct: inode.direct,
            indirect: inode.indirect,
            next_direct: 0,
            pointers: None,
            next_indirect: 0,
            done: false,
        }
    }
}

impl<B: FsckBackend + ?Sized> Iterator for DirBlocks<'_, B> {
    type Item = Result<u32, FsckError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while self.next_direct < NDIRECT {
            let addr = self.direct[self.next_direct];
            self.next_direct += 1;
            if addr != 0 {
                return Some(Ok(addr));
            }
        }

        if self.indirect == 0 {
            self.done = true;
            return None;
        }

        if self.pointers.is_none() {
            trace!("leyendo bloque indirecto {}", self.indirect);
            match self.backend.read_indirect(self.indirect) {
                Ok(pointers) => self.pointers = Some(pointers),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        let pointers = self.pointers.as_deref().unwrap_or_default();
        while self.next_indirect < pointers.len() {
            let addr = pointers[self.next_indirect];
            self.next_indirect += 1;
            if addr != 0 {
                return Some(Ok(addr));
            }
        }

        self.done = true;
        None
    }
}

/// Entradas de un bloque de directorio junto con su posición (hueco).
pub fn entries(block: &[u8]) -> impl Iterator<Item = (usize, Dirent)> + '_ {
    block
        .chunks_exact(DIRENT_SIZE)
        .enumerate()
        .map(|(slot, raw)| {
            let disk = bytemuck::pod_read_unaligned::<DirEntryDisk>(raw).from_le();
            (slot, Dirent::from(disk))
        })
}

/// Primera entrada no vacía llamada `name`, con el bloque y hueco donde está.
pub fn find_entry<B: FsckBackend + ?Sized>(
    backend: &B,
    dir: &Inode,
    name: &str,
) -> Result<Option<(u32, usize, Dirent)>, FsckError> {
    for block in DirBlocks::new(backend, dir) {
        let block = block?;
        for (slot, entry) in entries(backend.read_block(block)?) {
            if !entry.is_empty() && entry.name_is(name) {
                return Ok(Some((block, slot, entry)));
            }
        }
    }
    Ok(None)
}

/// Primer hueco libre (inodo 0) del directorio.
pub fn find_free_slot<B: FsckBackend + ?Sized>(
    backend: &B,
    dir: &Inode,
) -> Result<Option<(u32, usize)>, FsckError> {
    for block in DirBlocks::new(backend, dir) {
        let block = block?;
        if let Some((slot, _)) = entries(backend.read_block(block)?).find(|(_, e)| e.is_empty()) {
            return Ok(Some((block, slot)));
        }
    }
    Ok(None)
}

/// ¿Lista `dir` a `child` entre sus hijos? "." y ".." no cuentan.
pub fn lists_child<B: FsckBackend + ?Sized>(
    backend: &B,
    dir: &Inode,
    child: u32,
) -> Result<bool, FsckError> {
    for block in DirBlocks::new(backend, dir) {
        let block = block?;
        let found = entries(backend.read_block(block)?).any(|(_, e)| {
            !e.is_empty() && !e.is_dot() && !e.is_dotdot() && u32::from(e.inum) == child
        });
        if found {
            return Ok(true);
        }
    }
    Ok(false)
}
