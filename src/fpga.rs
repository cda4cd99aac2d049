//! FIR accelerator IP core.
//!
//! This module contains the userspace access to the FIR IP core and to the
//! marker mailbox through their UIO devices.

use crate::regs::{self, Mailbox, RegisterInterface};
use crate::uio::{Mapping, Uio};
use anyhow::{Context, Result};

/// Registers of the FIR IP core, accessed through a UIO mapping.
#[derive(Debug)]
pub struct UioRegisters(Mapping);

// The mapping is only accessed through &mut self, so moving it to another
// thread is sound.
unsafe impl Send for UioRegisters {}

/// Mailbox register accessed through a UIO mapping.
#[derive(Debug)]
pub struct UioMailbox {
    mapping: Mapping,
    offset: usize,
}

unsafe impl Send for UioMailbox {}

impl UioRegisters {
    /// Opens the registers of the FIR IP core.
    ///
    /// The IP core is found by the name of its UIO device. Fails if the
    /// register region is smaller than the register map.
    pub async fn open(name: &str) -> Result<UioRegisters> {
        let (mapping, phys_addr) = map(name).await?;
        if mapping.len() < regs::REGION_SIZE {
            anyhow::bail!(
                "UIO {name} maps {:#x} bytes, but the FIR registers span {:#x} bytes",
                mapping.len(),
                regs::REGION_SIZE
            );
        }
        tracing::info!("opened FIR IP core {name} at physical address {phys_addr:#010x}");
        Ok(UioRegisters(mapping))
    }
}

impl RegisterInterface for UioRegisters {
    fn read(&mut self, offset: usize) -> u32 {
        self.0.read_u32(offset)
    }

    fn write(&mut self, offset: usize, value: u32) {
        self.0.write_u32(offset, value)
    }
}

impl UioMailbox {
    /// Opens the mailbox register.
    ///
    /// The mailbox is the word at `offset` bytes in the first mapping of the
    /// UIO device called `name`.
    pub async fn open(name: &str, offset: usize) -> Result<UioMailbox> {
        let (mapping, phys_addr) = map(name).await?;
        if offset % 4 != 0 || offset + 4 > mapping.len() {
            anyhow::bail!("mailbox offset {offset:#x} is not a word inside UIO {name}");
        }
        tracing::info!(
            "opened mailbox {name} at physical address {:#010x}",
            phys_addr + offset
        );
        Ok(UioMailbox { mapping, offset })
    }
}

impl Mailbox for UioMailbox {
    fn post(&mut self, value: u32) {
        self.mapping.write_u32(self.offset, value)
    }
}

async fn map(name: &str) -> Result<(Mapping, usize)> {
    let uio = Uio::from_name(name)
        .await
        .with_context(|| format!("failed to open {name} UIO"))?;
    let mapping = uio
        .map_mapping(0)
        .await
        .with_context(|| format!("failed to map {name} UIO"))?;
    let phys_addr = uio.map_addr(0).await?;
    Ok((mapping, phys_addr))
}
