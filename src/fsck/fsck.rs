/*EL ARCHIVO PRINCIPAL DE FSCK. Las doce comprobaciones, en el orden en que
corren. Cada una devuelve el primer error que encuentra y `run_fsck` se detiene
ahí: las comprobaciones posteriores asumen que las anteriores pasaron.
La 2 construye los logs que usan de la 5 a la 12. */

use log::debug;

use super::{fsck_backend::FsckBackend, fsck_types::*};
use crate::dir::{self, entries, DirBlocks};
use crate::fs::ROOTINO;

// 1. Cada inodo está libre o es de un tipo válido.
pub fn check_inode_types<B: FsckBackend>(backend: &B) -> Result<(), FsckError> {
    for inum in 0..backend.superblock().ninodes {
        let inode = backend.read_inode(inum)?;
        if inode.kind().is_none() {
            return Err(FsckError::BadInode {
                inum,
                raw_type: inode.raw_type,
            });
        }
    }
    Ok(())
}

// 2. Direcciones dentro del rango de datos; de paso se llenan los logs.
pub fn check_inode_addrs<B: FsckBackend>(
    backend: &B,
    logs: &mut ScratchLogs,
) -> Result<(), FsckError> {
    let sb = *backend.superblock();

    for inum in 0..sb.ninodes {
        let inode = backend.read_inode(inum)?;
        if !inode.is_allocated() {
            continue;
        }
        logs.inode_allocated[inum as usize] = true;

        for &block in inode.direct.iter().filter(|&&b| b != 0) {
            if !sb.is_data_block(block) {
                return Err(FsckError::BadDirectAddress { inum, block });
            }
            logs.claim_direct(block);
        }

        if inode.indirect == 0 {
            continue;
        }
        if !sb.is_data_block(inode.indirect) {
            return Err(FsckError::BadIndirectAddress {
                inum,
                block: inode.indirect,
            });
        }
        logs.claim_indirect(inode.indirect);

        for block in backend
            .read_indirect(inode.indirect)?
            .into_iter()
            .filter(|&b| b != 0)
        {
            if !sb.is_data_block(block) {
                return Err(FsckError::BadIndirectAddress { inum, block });
            }
            logs.claim_indirect(block);
        }
    }
    Ok(())
}

// 3. La raíz es el inodo 1, es directorio y su "." y ".." apuntan a sí misma.
pub fn check_root<B: FsckBackend>(backend: &B) -> Result<(), FsckError> {
    if backend.superblock().ninodes <= ROOTINO {
        return Err(FsckError::RootMissingOrMalformed);
    }
    let root = backend.read_inode(ROOTINO)?;
    if !root.is_dir() {
        return Err(FsckError::RootMissingOrMalformed);
    }

    let mut dot = false;
    let mut dotdot = false;
    for block in DirBlocks::new(backend, &root) {
        let block = block?;
        // Aquí no se saltan huecos: un "." o ".." con inodo 0 cuenta como
        // encontrado y falla.
        for (_, entry) in entries(backend.read_block(block)?) {
            if !dot && entry.is_dot() {
                dot = true;
                if u32::from(entry.inum) != ROOTINO {
                    return Err(FsckError::RootMissingOrMalformed);
                }
            } else if !dotdot && entry.is_dotdot() {
                dotdot = true;
                if u32::from(entry.inum) != ROOTINO {
                    return Err(FsckError::RootMissingOrMalformed);
                }
            }
            if dot && dotdot {
                return Ok(());
            }
        }
    }
    Err(FsckError::RootMissingOrMalformed)
}

/// El ".." de `inum` debe ser un directorio que lo liste entre sus hijos.
fn check_parent<B: FsckBackend>(backend: &B, inum: u32, parent: u32) -> Result<(), FsckError> {
    let mismatch = FsckError::ParentMismatch { inum, parent };
    if parent == 0 || parent >= backend.superblock().ninodes {
        return Err(mismatch);
    }
    let parent_inode = backend.read_inode(parent)?;
    if !parent_inode.is_dir() {
        return Err(mismatch);
    }
    if dir::lists_child(backend, &parent_inode, inum)? {
        Ok(())
    } else {
        Err(mismatch)
    }
}

// 4. Cada directorio tiene exactamente un "." (a sí mismo) y un "..".
// Cuenta, por inodo destino, cuántas entradas normales lo nombran.
pub fn check_dir_format<B: FsckBackend>(
    backend: &B,
    dir_refs: &mut [u32],
) -> Result<(), FsckError> {
    for inum in 0..backend.superblock().ninodes {
        let inode = backend.read_inode(inum)?;
        if !inode.is_dir() {
            continue;
        }

        let malformed = || FsckError::DirectoryMalformed { inum };
        let mut dot = false;
        let mut dotdot = false;

        for block in DirBlocks::new(backend, &inode) {
            let block = block?;
            for (_, entry) in entries(backend.read_block(block)?) {
                if entry.is_empty() {
                    continue;
                }
                let target = u32::from(entry.inum);

                if entry.is_dot() {
                    if dot || target != inum {
                        return Err(malformed());
                    }
                    dot = true;
                } else if entry.is_dotdot() {
                    if dotdot {
                        return Err(malformed());
                    }
                    dotdot = true;
                    if inum != ROOTINO {
                        check_parent(backend, inum, target)?;
                    }
                } else {
                    let count = dir_refs.get_mut(target as usize).ok_or_else(malformed)?;
                    *count += 1;
                }
            }
        }

        if !dot || !dotdot {
            return Err(malformed());
        }
    }
    Ok(())
}

// 5. Toda dirección usada por un inodo está marcada en el bitmap.
pub fn check_inode_bitmap<B: FsckBackend>(backend: &B) -> Result<(), FsckError> {
    for inum in 0..backend.superblock().ninodes {
        let inode = backend.read_inode(inum)?;
        if !inode.is_allocated() {
            continue;
        }

        let mut blocks: Vec<u32> = inode.direct.to_vec();
        if inode.indirect != 0 {
            blocks.push(inode.indirect);
            blocks.extend(backend.read_indirect(inode.indirect)?);
        }

        for block in blocks.into_iter().filter(|&b| b != 0) {
            if !backend.bitmap_bit(block)? {
                return Err(FsckError::AddressNotInBitmap { inum, block });
            }
        }
    }
    Ok(())
}

// 6. Para cada bloque de datos: bit del bitmap == algún inodo lo usa.
pub fn check_bitmap_usage<B: FsckBackend>(
    backend: &B,
    logs: &ScratchLogs,
) -> Result<(), FsckError> {
    for (idx, &claimed) in logs.block_claimed.iter().enumerate() {
        let block = logs.data_block(idx);
        if backend.bitmap_bit(block)? != claimed {
            return Err(FsckError::BitmapMarksUnusedBlock { block });
        }
    }
    Ok(())
}

// 7. Ninguna dirección directa se usa más de una vez.
pub fn check_direct_unique(logs: &ScratchLogs) -> Result<(), FsckError> {
    match logs.direct_refs.iter().position(|&n| n > 1) {
        Some(idx) => Err(FsckError::DuplicateDirectAddress {
            block: logs.data_block(idx),
        }),
        None => Ok(()),
    }
}

// 8. Ninguna dirección indirecta se usa más de una vez.
pub fn check_indirect_unique(logs: &ScratchLogs) -> Result<(), FsckError> {
    match logs.indirect_refs.iter().position(|&n| n > 1) {
        Some(idx) => Err(FsckError::DuplicateIndirectAddress {
            block: logs.data_block(idx),
        }),
        None => Ok(()),
    }
}

// 9. Todo inodo en uso aparece en algún directorio.
pub fn check_allocated_referenced(logs: &ScratchLogs) -> Result<(), FsckError> {
    let unreferenced = logs
        .inode_allocated
        .iter()
        .zip(&logs.dir_refs)
        .position(|(&allocated, &refs)| allocated && refs == 0);
    match unreferenced {
        Some(inum) => Err(FsckError::InodeUnreferenced { inum: inum as u32 }),
        None => Ok(()),
    }
}

// 10. Referenciado en un directorio <=> marcado en uso.
pub fn check_referenced_allocated(logs: &ScratchLogs) -> Result<(), FsckError> {
    let mismatch = logs
        .inode_allocated
        .iter()
        .zip(&logs.dir_refs)
        .position(|(&allocated, &refs)| allocated != (refs >= 1));
    match mismatch {
        Some(inum) => Err(FsckError::DirectoryReferenceMismatch { inum: inum as u32 }),
        None => Ok(()),
    }
}

// 11. nlink de cada archivo == veces que aparece en directorios.
pub fn check_file_links<B: FsckBackend>(
    backend: &B,
    logs: &ScratchLogs,
) -> Result<(), FsckError> {
    for (inum, &refs) in logs.dir_refs.iter().enumerate() {
        let inode = backend.read_inode(inum as u32)?;
        if inode.is_file() && i64::from(inode.nlink) != i64::from(refs) {
            return Err(FsckError::BadFileLinkCount {
                inum: inum as u32,
                nlink: inode.nlink,
                refs,
            });
        }
    }
    Ok(())
}

// 12. Cada directorio aparece como mucho en un directorio padre.
pub fn check_dir_links<B: FsckBackend>(
    backend: &B,
    logs: &ScratchLogs,
) -> Result<(), FsckError> {
    for (inum, &refs) in logs.dir_refs.iter().enumerate() {
        if refs <= 1 {
            continue;
        }
        if backend.read_inode(inum as u32)?.is_dir() {
            return Err(FsckError::DirectoryMultiplyLinked {
                inum: inum as u32,
                refs,
            });
        }
    }
    Ok(())
}

fn summarize<B: FsckBackend>(backend: &B, logs: &ScratchLogs) -> Result<FsckReport, FsckError> {
    let mut report = FsckReport {
        data_blocks_in_use: logs.block_claimed.iter().filter(|&&c| c).count() as u32,
        ..Default::default()
    };
    for inum in 0..backend.superblock().ninodes {
        match backend.read_inode(inum)?.kind() {
            Some(InodeType::Dir) => report.directories += 1,
            Some(InodeType::File) => report.files += 1,
            Some(InodeType::Device) => report.devices += 1,
            _ => continue,
        }
        report.inodes_in_use += 1;
    }
    Ok(report)
}

pub fn run_fsck<B: FsckBackend>(backend: &B) -> Result<FsckReport, FsckError> {
    let mut logs = ScratchLogs::new(backend.superblock());

    // --- Paso 1: tipos de inodo ---
    check_inode_types(backend)?;
    debug!("1/12 tipos de inodo correctos");

    // --- Paso 2: direcciones + logs ---
    check_inode_addrs(backend, &mut logs)?;
    debug!("2/12 direcciones válidas");

    // --- Paso 3: raíz ---
    check_root(backend)?;
    debug!("3/12 raíz presente");

    // La raíz no tiene padre que la nombre: cuenta como referenciada.
    logs.dir_refs[ROOTINO as usize] = 1;

    // --- Paso 4: formato de directorios ---
    check_dir_format(backend, &mut logs.dir_refs)?;
    debug!("4/12 directorios bien formados");

    // --- Pasos 5 y 6: bitmap ---
    check_inode_bitmap(backend)?;
    debug!("5/12 direcciones marcadas en el bitmap");
    check_bitmap_usage(backend, &logs)?;
    debug!("6/12 bitmap coherente con el uso");

    // --- Pasos 7 y 8: unicidad de direcciones ---
    check_direct_unique(&logs)?;
    debug!("7/12 direcciones directas únicas");
    check_indirect_unique(&logs)?;
    debug!("8/12 direcciones indirectas únicas");

    // --- Pasos 9 a 12: referencias ---
    check_allocated_referenced(&logs)?;
    debug!("9/12 inodos en uso referenciados");
    check_referenced_allocated(&logs)?;
    debug!("10/12 referencias sólo a inodos en uso");
    check_file_links(backend, &logs)?;
    debug!("11/12 enlaces de archivos correctos");
    check_dir_links(backend, &logs)?;
    debug!("12/12 directorios con un solo padre");

    summarize(backend, &logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{NDIRECT, T_DIR, T_FILE};
    use crate::fsck::mock::MockImage;

    /// Raíz con un subdirectorio, archivos (uno con bloque indirecto), un
    /// dispositivo y un enlace duro.
    fn populated() -> MockImage {
        let mut img = MockImage::new(400, 64);
        let docs = img.mkdir(ROOTINO, "docs");
        img.create_file(ROOTINO, "README", 1);
        let big = img.create_file(docs, "big", NDIRECT + 5);
        img.link(ROOTINO, "big-link", big);
        img.mknod(ROOTINO, "console", 1, 1);
        img.mkdir(docs, "empty");
        img
    }

    fn fsck(img: MockImage) -> Result<FsckReport, FsckError> {
        run_fsck(&img.into_filesystem())
    }

    #[test]
    fn clean_image_passes() {
        let report = fsck(populated()).unwrap();
        assert_eq!(report.directories, 3);
        assert_eq!(report.files, 2);
        assert_eq!(report.devices, 1);
        assert_eq!(report.inodes_in_use, 6);
    }

    #[test]
    fn fresh_image_passes() {
        let report = fsck(MockImage::new(64, 8)).unwrap();
        assert_eq!(report.inodes_in_use, 1);
        assert_eq!(report.data_blocks_in_use, 1);
    }

    #[test]
    fn invalid_type_is_bad_inode() {
        let mut img = MockImage::new(100, 16);
        for i in 0..4 {
            img.create_file(ROOTINO, &format!("f{i}"), 0);
        }
        img.update_inode(5, |ino| ino.file_type = 7);
        assert!(matches!(
            fsck(img),
            Err(FsckError::BadInode { inum: 5, raw_type: 7 })
        ));
    }

    #[test]
    fn direct_pointer_past_the_end() {
        let mut img = MockImage::new(100, 16);
        img.create_file(ROOTINO, "a", 0);
        let f = img.create_file(ROOTINO, "b", 1);
        assert_eq!(f, 3);
        let size = img.superblock().size;
        img.update_inode(3, |ino| ino.addrs[0] = size);
        assert!(matches!(
            fsck(img),
            Err(FsckError::BadDirectAddress { inum: 3, block }) if block == size
        ));
    }

    #[test]
    fn direct_pointer_into_metadata() {
        let mut img = MockImage::new(100, 16);
        let f = img.create_file(ROOTINO, "a", 1);
        img.update_inode(f, |ino| ino.addrs[0] = 2);
        assert!(matches!(fsck(img), Err(FsckError::BadDirectAddress { .. })));
    }

    #[test]
    fn indirect_pointer_out_of_range() {
        let mut img = MockImage::new(100, 16);
        let f = img.create_file(ROOTINO, "a", 1);
        img.update_inode(f, |ino| ino.addrs[NDIRECT] = 1);
        assert!(matches!(
            fsck(img),
            Err(FsckError::BadIndirectAddress { block: 1, .. })
        ));
    }

    #[test]
    fn indirect_target_out_of_range() {
        let mut img = MockImage::new(100, 16);
        let f = img.create_file(ROOTINO, "a", NDIRECT + 1);
        let indirect = img.inode(f).addrs[NDIRECT];
        img.set_indirect_entry(indirect, 1, 100);
        assert!(matches!(
            fsck(img),
            Err(FsckError::BadIndirectAddress { block: 100, .. })
        ));
    }

    #[test]
    fn root_must_be_a_directory() {
        let mut img = MockImage::new(100, 16);
        img.update_inode(ROOTINO, |ino| ino.file_type = T_FILE);
        assert!(matches!(fsck(img), Err(FsckError::RootMissingOrMalformed)));
    }

    #[test]
    fn root_parent_must_be_itself() {
        let mut img = MockImage::new(100, 16);
        let d = img.mkdir(ROOTINO, "d");
        let block = img.blocks_of(ROOTINO)[0];
        img.put_dirent(block, 1, d, "..");
        assert!(matches!(fsck(img), Err(FsckError::RootMissingOrMalformed)));
    }

    #[test]
    fn root_found_through_indirect_blocks() {
        let mut img = MockImage::new(400, 16);
        // "." y ".." sólo en un bloque alcanzado por el indirecto
        let root_block = img.blocks_of(ROOTINO)[0];
        for _ in 0..NDIRECT {
            img.add_block(ROOTINO);
        }
        let last = img.add_block(ROOTINO);
        img.put_dirent(last, 0, ROOTINO, ".");
        img.put_dirent(last, 1, ROOTINO, "..");
        img.put_dirent(root_block, 0, 0, "");
        img.put_dirent(root_block, 1, 0, "");
        assert!(img.inode(ROOTINO).addrs[NDIRECT] != 0);

        let fs = img.into_filesystem();
        assert!(check_root(&fs).is_ok());
    }

    #[test]
    fn root_dot_with_inode_zero_is_not_skipped() {
        let mut img = MockImage::new(100, 16);
        let first = img.blocks_of(ROOTINO)[0];
        let second = img.add_block(ROOTINO);
        img.put_dirent(second, 0, ROOTINO, ".");
        img.put_dirent(second, 1, ROOTINO, "..");
        // el primer "." queda con inodo 0: cuenta como encontrado
        img.put_dirent(first, 0, 0, ".");

        let fs = img.into_filesystem();
        assert!(matches!(
            check_root(&fs),
            Err(FsckError::RootMissingOrMalformed)
        ));
    }

    #[test]
    fn missing_dot_is_malformed() {
        let mut img = MockImage::new(100, 16);
        let d = img.mkdir(ROOTINO, "d");
        let block = img.blocks_of(d)[0];
        img.put_dirent(block, 0, 0, "");
        assert!(matches!(
            fsck(img),
            Err(FsckError::DirectoryMalformed { inum }) if inum == d
        ));
    }

    #[test]
    fn dot_must_point_to_itself() {
        let mut img = MockImage::new(100, 16);
        let d = img.mkdir(ROOTINO, "d");
        let block = img.blocks_of(d)[0];
        img.put_dirent(block, 0, ROOTINO, ".");
        assert!(matches!(fsck(img), Err(FsckError::DirectoryMalformed { .. })));
    }

    #[test]
    fn duplicate_dotdot_is_malformed() {
        let mut img = MockImage::new(100, 16);
        let d = img.mkdir(ROOTINO, "d");
        let block = img.blocks_of(d)[0];
        img.put_dirent(block, 5, ROOTINO, "..");
        assert!(matches!(fsck(img), Err(FsckError::DirectoryMalformed { .. })));
    }

    #[test]
    fn parent_must_list_the_child() {
        let mut img = MockImage::new(100, 16);
        let a = img.mkdir(ROOTINO, "a");
        let b = img.mkdir(ROOTINO, "b");
        // el ".." de b dice "a", pero a no lista a b
        let block = img.blocks_of(b)[0];
        img.put_dirent(block, 1, a, "..");
        assert!(matches!(
            fsck(img),
            Err(FsckError::ParentMismatch { inum, parent }) if inum == b && parent == a
        ));
    }

    #[test]
    fn parent_out_of_range() {
        let mut img = MockImage::new(100, 16);
        let d = img.mkdir(ROOTINO, "d");
        let block = img.blocks_of(d)[0];
        img.put_dirent(block, 1, 15_000, "..");
        assert!(matches!(fsck(img), Err(FsckError::ParentMismatch { .. })));
    }

    #[test]
    fn entry_naming_inode_out_of_range() {
        let mut img = MockImage::new(100, 16);
        let block = img.blocks_of(ROOTINO)[0];
        img.put_dirent(block, 4, 16, "ghost");
        assert!(matches!(fsck(img), Err(FsckError::DirectoryMalformed { inum: 1 })));
    }

    #[test]
    fn used_address_marked_free() {
        let mut img = MockImage::new(100, 16);
        let f = img.create_file(ROOTINO, "a", 2);
        let block = img.inode(f).addrs[1];
        img.set_bitmap(block, false);
        assert!(matches!(
            fsck(img),
            Err(FsckError::AddressNotInBitmap { block: b, .. }) if b == block
        ));
    }

    #[test]
    fn indirect_block_marked_free() {
        let mut img = MockImage::new(100, 16);
        let f = img.create_file(ROOTINO, "a", NDIRECT + 1);
        let indirect = img.inode(f).addrs[NDIRECT];
        img.set_bitmap(indirect, false);
        assert!(matches!(
            fsck(img),
            Err(FsckError::AddressNotInBitmap { block, .. }) if block == indirect
        ));
    }

    #[test]
    fn bitmap_marks_unused_block() {
        let mut img = MockImage::new(100, 16);
        img.create_file(ROOTINO, "a", 1);
        img.set_bitmap(90, true);
        assert!(matches!(
            fsck(img),
            Err(FsckError::BitmapMarksUnusedBlock { block: 90 })
        ));
    }

    #[test]
    fn duplicate_direct_address() {
        let mut img = MockImage::new(100, 16);
        let a = img.create_file(ROOTINO, "a", 1);
        let b = img.create_file(ROOTINO, "b", 1);
        let shared = img.inode(a).addrs[0];
        let orphaned = img.inode(b).addrs[0];
        img.update_inode(b, |ino| ino.addrs[0] = shared);
        img.set_bitmap(orphaned, false);
        assert!(matches!(
            fsck(img),
            Err(FsckError::DuplicateDirectAddress { block }) if block == shared
        ));
    }

    #[test]
    fn duplicate_indirect_address() {
        let mut img = MockImage::new(200, 16);
        let a = img.create_file(ROOTINO, "a", NDIRECT + 1);
        let b = img.create_file(ROOTINO, "b", NDIRECT + 1);
        let shared = img.inode(a).addrs[NDIRECT];
        let a_target = img.blocks_of(a)[NDIRECT];
        let b_indirect = img.inode(b).addrs[NDIRECT];
        let b_target = img.blocks_of(b)[NDIRECT];
        img.update_inode(b, |ino| ino.addrs[NDIRECT] = shared);
        img.set_bitmap(b_indirect, false);
        img.set_bitmap(b_target, false);
        assert!(matches!(
            fsck(img),
            Err(FsckError::DuplicateIndirectAddress { block }) if block == a_target.min(shared)
        ));
    }

    #[test]
    fn allocated_but_unreferenced() {
        let mut img = MockImage::new(100, 16);
        let f = img.create_file(ROOTINO, "a", 1);
        img.unlink_entry(ROOTINO, "a");
        assert!(matches!(
            fsck(img),
            Err(FsckError::InodeUnreferenced { inum }) if inum == f
        ));
    }

    #[test]
    fn referenced_but_free() {
        let mut img = MockImage::new(100, 16);
        let f = img.create_file(ROOTINO, "a", 0);
        img.update_inode(f, |ino| ino.file_type = 0);
        assert!(matches!(
            fsck(img),
            Err(FsckError::DirectoryReferenceMismatch { inum }) if inum == f
        ));
    }

    #[test]
    fn file_link_count_too_high() {
        let mut img = MockImage::new(100, 16);
        let f = img.create_file(ROOTINO, "a", 1);
        img.update_inode(f, |ino| ino.nlink = 2);
        assert!(matches!(
            fsck(img),
            Err(FsckError::BadFileLinkCount { nlink: 2, refs: 1, .. })
        ));
    }

    #[test]
    fn hard_links_count_every_entry() {
        let mut img = MockImage::new(100, 16);
        let d = img.mkdir(ROOTINO, "d");
        let f = img.create_file(ROOTINO, "a", 1);
        img.link(d, "again", f);
        img.link(d, "third", f);
        assert_eq!(img.inode(f).nlink, 3);
        assert!(fsck(img).is_ok());
    }

    #[test]
    fn directory_linked_twice() {
        let mut img = MockImage::new(100, 16);
        let a = img.mkdir(ROOTINO, "a");
        let b = img.mkdir(ROOTINO, "b");
        img.link(b, "alias", a);
        assert!(matches!(
            fsck(img),
            Err(FsckError::DirectoryMultiplyLinked { inum, refs: 2 }) if inum == a
        ));
    }

    #[test]
    fn first_failing_check_wins() {
        // tipo inválido y además un bloque marcado de más: gana la comprobación 1
        let mut img = MockImage::new(100, 16);
        let f = img.create_file(ROOTINO, "a", 1);
        img.set_bitmap(90, true);
        img.update_inode(f, |ino| ino.file_type = T_DIR + 10);
        assert!(matches!(fsck(img), Err(FsckError::BadInode { .. })));
    }

    #[test]
    fn logs_from_address_pass() {
        let img = populated();
        let sb = img.superblock();
        let fs = img.into_filesystem();
        let mut logs = ScratchLogs::new(&sb);
        check_inode_addrs(&fs, &mut logs).unwrap();

        assert!(logs.inode_allocated[ROOTINO as usize]);
        assert!(!logs.inode_allocated[0]);
        // big: NDIRECT directos, indirecto + 5 destinos
        assert_eq!(logs.indirect_refs.iter().sum::<u32>(), 6);
        assert!(logs.direct_refs.iter().all(|&n| n <= 1));
        let claimed = logs.block_claimed.iter().filter(|&&c| c).count();
        let marked = (sb.data_start()..sb.size)
            .filter(|&b| fs.bitmap_bit(b).unwrap())
            .count();
        assert_eq!(claimed, marked);
    }
}
