/*Constructor de imágenes xv6 en memoria, al estilo de mkfs.
Sirve para las pruebas: arma una imagen válida (raíz con "." y "..", bitmap
coherente, enlaces contados) y expone accesos crudos para corromperla a mano.
Los parámetros inválidos son un error del que escribe la prueba: entra en pánico. */

use crate::fs::{
    block_offset, DirEntryDisk, Filesystem, Image, InodeDisk, SuperblockDisk, BSIZE,
    DIRENTS_PER_BLOCK, DIRENT_SIZE, INODE_SIZE, NDIRECT, ROOTINO, T_DEV, T_DIR,
    T_FILE,
};

pub struct MockImage {
    superblock: SuperblockDisk,
    data: Vec<u8>,
    next_block: u32,
    next_inum: u32,
}

impl MockImage {
    /// Imagen de `size` bloques con `ninodes` inodos; sólo existe la raíz.
    ///
    /// Layout: 0 arranque, 1 superblock, luego la tabla de inodos, el bitmap
    /// y los bloques de datos hasta el final.
    pub fn new(size: u32, ninodes: u32) -> Self {
        let inode_blocks = (ninodes as usize * INODE_SIZE).div_ceil(BSIZE) as u32;
        let bitmap_blocks = (size as usize).div_ceil(BSIZE * 8) as u32;

        let inodestart = 2;
        let bmapstart = inodestart + inode_blocks;
        let data_start = bmapstart + bitmap_blocks;
        assert!(
            data_start < size,
            "no hay espacio para bloques de datos: size={size}, data_start={data_start}"
        );
        assert!(ninodes > ROOTINO, "hacen falta al menos dos inodos");

        let superblock = SuperblockDisk {
            size,
            nblocks: size - data_start,
            ninodes,
            nlog: 0,
            logstart: inodestart,
            inodestart,
            bmapstart,
        };

        let mut img = Self {
            superblock,
            data: vec![0u8; size as usize * BSIZE],
            next_block: data_start,
            next_inum: ROOTINO,
        };

        let at = block_offset(1) as usize;
        img.data[at..at + std::mem::size_of::<SuperblockDisk>()]
            .copy_from_slice(bytemuck::bytes_of(&superblock.to_le()));

        // Metadatos marcados como usados: [0 .. data_start)
        for b in 0..data_start {
            img.set_bitmap(b, true);
        }

        let root = img.alloc_inode(T_DIR);
        let block = img.add_block(root);
        img.put_dirent(block, 0, root, ".");
        img.put_dirent(block, 1, root, "..");
        img
    }

    pub fn superblock(&self) -> SuperblockDisk {
        self.superblock
    }

    /// Siguiente bloque de datos libre, ya marcado en el bitmap.
    pub fn alloc_block(&mut self) -> u32 {
        let block = self.next_block;
        assert!(block < self.superblock.size, "imagen sin bloques libres");
        self.next_block += 1;
        self.set_bitmap(block, true);
        block
    }

    /// Siguiente inodo libre con el tipo dado y sin enlaces.
    pub fn alloc_inode(&mut self, file_type: i16) -> u32 {
        let inum = self.next_inum;
        assert!(inum < self.superblock.ninodes, "imagen sin inodos libres");
        self.next_inum += 1;
        self.set_inode(
            inum,
            InodeDisk {
                file_type,
                ..Default::default()
            },
        );
        inum
    }

    pub fn inode(&self, inum: u32) -> InodeDisk {
        let at = self.superblock.inode_offset(inum) as usize;
        bytemuck::pod_read_unaligned::<InodeDisk>(&self.data[at..at + INODE_SIZE]).from_le()
    }

    pub fn set_inode(&mut self, inum: u32, inode: InodeDisk) {
        let at = self.superblock.inode_offset(inum) as usize;
        self.data[at..at + INODE_SIZE].copy_from_slice(bytemuck::bytes_of(&inode.to_le()));
    }

    pub fn update_inode(&mut self, inum: u32, f: impl FnOnce(&mut InodeDisk)) {
        let mut inode = self.inode(inum);
        f(&mut inode);
        self.set_inode(inum, inode);
    }

    pub fn bitmap(&self, block: u32) -> bool {
        let (byte, bit) = self.superblock.bitmap_position(block);
        (self.data[byte as usize] >> bit) & 1 == 1
    }

    pub fn set_bitmap(&mut self, block: u32, used: bool) {
        let (byte, bit) = self.superblock.bitmap_position(block);
        if used {
            self.data[byte as usize] |= 1 << bit;
        } else {
            self.data[byte as usize] &= !(1 << bit);
        }
    }

    pub fn dirent(&self, block: u32, slot: usize) -> DirEntryDisk {
        let at = block_offset(block) as usize + slot * DIRENT_SIZE;
        bytemuck::pod_read_unaligned::<DirEntryDisk>(&self.data[at..at + DIRENT_SIZE]).from_le()
    }

    pub fn put_dirent(&mut self, block: u32, slot: usize, inum: u32, name: &str) {
        let entry = DirEntryDisk::new(inum as u16, name.as_bytes());
        let at = block_offset(block) as usize + slot * DIRENT_SIZE;
        self.data[at..at + DIRENT_SIZE].copy_from_slice(bytemuck::bytes_of(&entry.to_le()));
    }

    /// Puntero `index` del bloque indirecto `block`.
    pub fn set_indirect_entry(&mut self, block: u32, index: usize, target: u32) {
        let at = block_offset(block) as usize + index * 4;
        self.data[at..at + 4].copy_from_slice(&target.to_le_bytes());
    }

    fn indirect_entries(&self, block: u32) -> Vec<u32> {
        let at = block_offset(block) as usize;
        self.data[at..at + BSIZE]
            .chunks_exact(4)
            .map(|raw| u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            .collect()
    }

    /// Bloques de datos del inodo: directos y luego los del indirecto.
    pub fn blocks_of(&self, inum: u32) -> Vec<u32> {
        let inode = self.inode(inum);
        let mut blocks: Vec<u32> = inode.addrs[..NDIRECT]
            .iter()
            .copied()
            .filter(|&b| b != 0)
            .collect();
        if inode.addrs[NDIRECT] != 0 {
            blocks.extend(
                self.indirect_entries(inode.addrs[NDIRECT])
                    .into_iter()
                    .filter(|&b| b != 0),
            );
        }
        blocks
    }

    /// Añade un bloque al final del inodo, pasando al indirecto cuando los
    /// directos se agotan.
    pub fn add_block(&mut self, inum: u32) -> u32 {
        let mut inode = self.inode(inum);
        let block = self.alloc_block();

        if let Some(slot) = inode.addrs[..NDIRECT].iter().position(|&b| b == 0) {
            inode.addrs[slot] = block;
        } else {
            if inode.addrs[NDIRECT] == 0 {
                inode.addrs[NDIRECT] = self.alloc_block();
            }
            let indirect = inode.addrs[NDIRECT];
            let index = self
                .indirect_entries(indirect)
                .iter()
                .position(|&b| b == 0)
                .expect("bloque indirecto lleno");
            self.set_indirect_entry(indirect, index, block);
        }

        inode.size += BSIZE as u32;
        self.set_inode(inum, inode);
        block
    }

    pub fn find_entry(&self, dir: u32, name: &str) -> Option<(u32, usize)> {
        for block in self.blocks_of(dir) {
            for slot in 0..DIRENTS_PER_BLOCK {
                let entry = self.dirent(block, slot);
                let end = entry.name.iter().position(|&b| b == 0).unwrap_or(entry.name.len());
                if entry.inum != 0 && &entry.name[..end] == name.as_bytes() {
                    return Some((block, slot));
                }
            }
        }
        None
    }

    /// Crea la entrada `name -> inum` en `dir` y suma un enlace al destino.
    pub fn link(&mut self, dir: u32, name: &str, inum: u32) {
        let free = self.blocks_of(dir).into_iter().find_map(|block| {
            (0..DIRENTS_PER_BLOCK)
                .find(|&slot| self.dirent(block, slot).inum == 0)
                .map(|slot| (block, slot))
        });
        let (block, slot) = match free {
            Some(found) => found,
            None => (self.add_block(dir), 0),
        };
        self.put_dirent(block, slot, inum, name);
        self.update_inode(inum, |ino| ino.nlink += 1);
    }

    /// Borra la entrada `name` de `dir` sin tocar el contador de enlaces.
    pub fn unlink_entry(&mut self, dir: u32, name: &str) -> Option<(u32, usize)> {
        let (block, slot) = self.find_entry(dir, name)?;
        let at = block_offset(block) as usize + slot * DIRENT_SIZE;
        self.data[at..at + DIRENT_SIZE].fill(0);
        Some((block, slot))
    }

    pub fn mkdir(&mut self, parent: u32, name: &str) -> u32 {
        let inum = self.alloc_inode(T_DIR);
        let block = self.add_block(inum);
        self.put_dirent(block, 0, inum, ".");
        self.put_dirent(block, 1, parent, "..");
        self.link(parent, name, inum);
        inum
    }

    /// Archivo regular con `nblocks` bloques de datos (puede usar el indirecto).
    pub fn create_file(&mut self, parent: u32, name: &str, nblocks: usize) -> u32 {
        let inum = self.alloc_inode(T_FILE);
        for _ in 0..nblocks {
            self.add_block(inum);
        }
        self.link(parent, name, inum);
        inum
    }

    pub fn mknod(&mut self, parent: u32, name: &str, major: i16, minor: i16) -> u32 {
        let inum = self.alloc_inode(T_DEV);
        self.update_inode(inum, |ino| {
            ino.major = major;
            ino.minor = minor;
        });
        self.link(parent, name, inum);
        inum
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn into_image(self, writable: bool) -> Image {
        Image::from_bytes(self.data, writable)
    }

    /// Backend de sólo lectura sobre la imagen.
    pub fn into_filesystem(self) -> Filesystem {
        self.load(false)
    }

    /// Backend de lectura/escritura sobre la imagen.
    pub fn into_filesystem_rw(self) -> Filesystem {
        self.load(true)
    }

    fn load(self, writable: bool) -> Filesystem {
        Filesystem::load(self.into_image(writable)).expect("la imagen incluye el superblock")
    }
}
