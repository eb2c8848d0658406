//! wlr-gamma-control backend: pushes transfer tables to every output.

use anyhow::{Context, Result};
use memmap2::MmapMut;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use wayland_client::{
    Connection, Dispatch, Proxy, QueueHandle, delegate_noop,
    protocol::{wl_output, wl_registry},
};
use wayland_protocols_wlr::gamma_control::v1::client::{
    zwlr_gamma_control_manager_v1::ZwlrGammaControlManagerV1,
    zwlr_gamma_control_v1::{self, ZwlrGammaControlV1},
};

use blueshift::TransferTable;
use blueshift::gamma::DEFAULT_TABLE_SIZE;

/// Registry name of the output a proxy belongs to.
#[derive(Clone, Copy)]
pub struct OutputId(pub u32);

pub struct Output {
    pub name: Option<String>,
    pub description: Option<String>,
    wl_output: wl_output::WlOutput,
    gamma: Option<ZwlrGammaControlV1>,
    ramp_size: usize,
    ramp: Option<(File, MmapMut)>,
}

impl Output {
    fn new(wl_output: wl_output::WlOutput) -> Self {
        Self {
            name: None,
            description: None,
            wl_output,
            gamma: None,
            ramp_size: 0,
            ramp: None,
        }
    }

    /// True when `filters` is empty or names this output.
    pub fn selected(&self, filters: &[String]) -> bool {
        filters.is_empty()
            || filters.iter().any(|f| {
                self.name.as_deref() == Some(f.as_str())
                    || self.description.as_deref() == Some(f.as_str())
            })
    }

    fn allocate_ramp(&mut self, size: usize) -> Result<()> {
        self.ramp_size = 0;
        self.ramp = None;
        let bytes = size * 3 * std::mem::size_of::<u16>();
        let file = create_anonymous_file(bytes).context("allocate gamma ramp")?;
        let mmap = unsafe { MmapMut::map_mut(&file) }.context("mmap gamma ramp")?;
        self.ramp = Some((file, mmap));
        self.ramp_size = size;
        Ok(())
    }

    fn drop_gamma(&mut self) {
        if let Some(gamma) = self.gamma.take() {
            gamma.destroy();
        }
        self.ramp = None;
        self.ramp_size = 0;
    }

    /// Returns false when the output has no usable gamma control yet.
    fn apply(&mut self, table: &TransferTable) -> bool {
        let (Some(gamma), Some((file, mmap))) = (self.gamma.as_ref(), self.ramp.as_mut()) else {
            return false;
        };
        if self.ramp_size == 0 {
            return false;
        }
        table.write_ramp(bytemuck::cast_slice_mut::<u8, u16>(mmap), self.ramp_size);
        if let Err(err) = file.seek(SeekFrom::Start(0)) {
            log::warn!("Failed to rewind gamma ramp for {:?}: {err}", self.name);
            return false;
        }
        log::debug!(
            "Applying gamma to output {:?} (ramp_size: {})",
            self.name,
            self.ramp_size
        );
        gamma.set_gamma(file.as_fd());
        true
    }
}

#[derive(Default)]
pub struct Displays {
    pub outputs: HashMap<u32, Output>,
    manager: Option<(u32, ZwlrGammaControlManagerV1)>,
}

impl Displays {
    pub fn has_gamma_control(&self) -> bool {
        self.manager.is_some()
    }

    fn request_gamma(&mut self, qh: &QueueHandle<Self>, id: u32) {
        let Some((_, manager)) = self.manager.as_ref() else {
            return;
        };
        let Some(output) = self.outputs.get_mut(&id) else {
            return;
        };
        if output.gamma.is_none() {
            output.gamma = Some(manager.get_gamma_control(&output.wl_output, qh, OutputId(id)));
        }
    }

    pub fn request_gamma_all(&mut self, qh: &QueueHandle<Self>) {
        let ids: Vec<u32> = self.outputs.keys().copied().collect();
        for id in ids {
            self.request_gamma(qh, id);
        }
    }

    /// Writes `table` to every selected output. Returns how many took it.
    pub fn apply_all(&mut self, table: &TransferTable, filters: &[String]) -> usize {
        self.outputs
            .values_mut()
            .filter(|o| o.selected(filters))
            .map(|o| o.apply(table))
            .filter(|applied| *applied)
            .count()
    }

    /// Identity ramp on every selected output.
    pub fn reset_all(&mut self, filters: &[String]) -> usize {
        self.apply_all(&TransferTable::identity(DEFAULT_TABLE_SIZE), filters)
    }

    /// Drops every gamma control so the compositor restores the original ramps.
    pub fn release_all(&mut self) {
        for output in self.outputs.values_mut() {
            output.drop_gamma();
        }
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for Displays {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                if interface == wl_output::WlOutput::interface().name {
                    let wl_output = registry.bind::<wl_output::WlOutput, _, _>(
                        name,
                        version.min(4),
                        qh,
                        OutputId(name),
                    );
                    state.outputs.insert(name, Output::new(wl_output));
                    state.request_gamma(qh, name);
                } else if interface == ZwlrGammaControlManagerV1::interface().name {
                    let manager = registry.bind::<ZwlrGammaControlManagerV1, _, _>(name, 1, qh, ());
                    state.manager = Some((name, manager));
                    state.request_gamma_all(qh);
                }
            }
            wl_registry::Event::GlobalRemove { name } => {
                if state.manager.as_ref().is_some_and(|(id, _)| *id == name) {
                    log::warn!("Gamma control manager went away");
                    state.manager = None;
                }
                if let Some(output) = state.outputs.remove(&name) {
                    log::info!("Output {:?} removed", output.name);
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_output::WlOutput, OutputId> for Displays {
    fn event(
        state: &mut Self,
        _: &wl_output::WlOutput,
        event: wl_output::Event,
        id: &OutputId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let Some(output) = state.outputs.get_mut(&id.0) else {
            return;
        };
        match event {
            wl_output::Event::Name { name } => output.name = Some(name),
            wl_output::Event::Description { description } => {
                output.description = Some(description)
            }
            _ => {}
        }
    }
}

impl Dispatch<ZwlrGammaControlV1, OutputId> for Displays {
    fn event(
        state: &mut Self,
        _: &ZwlrGammaControlV1,
        event: zwlr_gamma_control_v1::Event,
        id: &OutputId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let Some(output) = state.outputs.get_mut(&id.0) else {
            return;
        };
        match event {
            zwlr_gamma_control_v1::Event::GammaSize { size } => {
                if let Err(err) = output.allocate_ramp(size as usize) {
                    log::warn!("Output {:?}: {err:#}", output.name);
                }
            }
            zwlr_gamma_control_v1::Event::Failed => {
                log::warn!(
                    "Gamma control failed for output {:?} (another client owns it?)",
                    output.name
                );
                output.drop_gamma();
            }
            _ => {}
        }
    }
}

delegate_noop!(Displays: ignore ZwlrGammaControlManagerV1);

pub fn create_anonymous_file(size: usize) -> Result<File> {
    let mut path = std::env::temp_dir();
    path.push(format!("blueshift-{}-{}", std::process::id(), size));
    let f = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&path)?;
    f.set_len(size as u64)?;
    let _ = std::fs::remove_file(&path);
    Ok(f)
}
