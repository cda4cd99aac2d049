//! UIO device access.
//!
//! This module is used to find UIO devices by name and to map their register
//! regions into the process address space.

use anyhow::{Context, Result};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use tokio::fs;

/// UIO device.
///
/// This struct represents an open `/dev/uio<num>` device.
#[derive(Debug)]
pub struct Uio {
    num: usize,
    file: fs::File,
}

/// UIO device mapping.
///
/// This struct corresponds to a memory-mapped IO region of an UIO device and
/// gives volatile 32-bit access to it. Dropping this struct unmaps the region.
#[derive(Debug)]
pub struct Mapping {
    base: *mut libc::c_void,
    effective: *mut libc::c_void,
    map_size: usize,
    len: usize,
}

impl Uio {
    /// Opens an UIO using its number.
    pub async fn from_num(num: usize) -> Result<Uio> {
        let path = format!("/dev/uio{num}");
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to open {path}"))?;
        Ok(Uio { num, file })
    }

    /// Opens an UIO using its name.
    ///
    /// The name is matched against the contents of
    /// `/sys/class/uio/uio*/name`.
    pub async fn from_name(name: &str) -> Result<Uio> {
        match Self::find_by_name(name).await? {
            Some(num) => Self::from_num(num).await,
            None => anyhow::bail!("UIO device {name} not found"),
        }
    }

    async fn find_by_name(name: &str) -> Result<Option<usize>> {
        let mut entries = fs::read_dir(Path::new("/sys/class/uio"))
            .await
            .context("failed to list UIO devices")?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(num) = entry
                .file_name()
                .to_str()
                .and_then(|uio| uio.strip_prefix("uio"))
                .and_then(|num| num.parse::<usize>().ok())
            else {
                continue;
            };
            let this_name = fs::read_to_string(entry.path().join("name")).await?;
            if this_name.trim_end() == name {
                return Ok(Some(num));
            }
        }
        Ok(None)
    }

    /// Maps a memory mapping of the UIO device.
    ///
    /// The `mapping` number is the number listed in
    /// `/sys/class/uio/uio*/maps/map<mapping>`. Devices with a single region
    /// use mapping `0`.
    pub async fn map_mapping(&self, mapping: usize) -> Result<Mapping> {
        let offset = mapping * page_size::get();
        let map_size = self.map_size(mapping).await?;
        let effective_offset = self.map_offset(mapping).await?;
        if effective_offset >= map_size {
            anyhow::bail!("UIO mapping offset {effective_offset:#x} outside of mapping");
        }

        let base = unsafe {
            match libc::mmap(
                std::ptr::null_mut::<libc::c_void>(),
                map_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                self.file.as_raw_fd(),
                offset as libc::off_t,
            ) {
                libc::MAP_FAILED => anyhow::bail!("mmap UIO failed"),
                x => x,
            }
        };
        let effective = unsafe { base.add(effective_offset) };
        Ok(Mapping {
            base,
            effective,
            map_size,
            len: map_size - effective_offset,
        })
    }

    async fn read_mapping_hex(&self, mapping: usize, fname: &str) -> Result<usize> {
        let path = format!("/sys/class/uio/uio{}/maps/map{}/{}", self.num, mapping, fname);
        let n = fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {path}"))?;
        Ok(usize::from_str_radix(
            n.trim_end()
                .strip_prefix("0x")
                .ok_or_else(|| anyhow::anyhow!("prefix 0x not present in {path}"))?,
            16,
        )?)
    }

    /// Gives the size of a UIO mapping.
    pub async fn map_size(&self, mapping: usize) -> Result<usize> {
        self.read_mapping_hex(mapping, "size").await
    }

    /// Gives the offset of a UIO mapping within its page.
    pub async fn map_offset(&self, mapping: usize) -> Result<usize> {
        self.read_mapping_hex(mapping, "offset").await
    }

    /// Gives the physical address of a UIO mapping.
    pub async fn map_addr(&self, mapping: usize) -> Result<usize> {
        self.read_mapping_hex(mapping, "addr").await
    }
}

impl Mapping {
    /// Gives the number of accessible bytes in the mapping.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the mapping has no accessible bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn word(&self, offset: usize) -> *mut u32 {
        assert!(
            offset % 4 == 0 && offset + 4 <= self.len,
            "register offset {offset:#x} out of range"
        );
        unsafe { self.effective.cast::<u8>().add(offset).cast::<u32>() }
    }

    /// Reads the 32-bit word at `offset` bytes from the start of the mapping.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not word aligned or the word is outside the
    /// mapping.
    pub fn read_u32(&self, offset: usize) -> u32 {
        unsafe { self.word(offset).read_volatile() }
    }

    /// Writes the 32-bit word at `offset` bytes from the start of the mapping.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not word aligned or the word is outside the
    /// mapping.
    pub fn write_u32(&self, offset: usize, value: u32) {
        unsafe { self.word(offset).write_volatile(value) }
    }
}

/// Unmaps the UIO device mapping.
impl Drop for Mapping {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base, self.map_size);
        }
    }
}
