use crate::error::{StartError, StartResult};
use crate::geometry::Geometry;

/// The in-memory image of the loaded cylinder, all heads, head-major.
///
/// The buffer is allocated once and never resized, so its address can be
/// handed to the signal generator for the controller's whole run. Its
/// contents mean nothing unless `current()` names a cylinder.
pub struct CylinderStore {
    geometry: Geometry,
    data: Vec<u8>,
    current: Option<u32>,
}

impl CylinderStore {
    /// Allocate the buffer, reporting failure instead of aborting.
    pub fn allocate(geometry: Geometry) -> StartResult<Self> {
        let bytes = geometry.cylinder_bytes();
        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| StartError::Allocation { bytes })?;
        data.resize(bytes, 0);
        Ok(CylinderStore { geometry, data, current: None })
    }

    /// The cylinder whose data the buffer holds, or None if the contents
    /// are not to be trusted.
    pub fn current(&self) -> Option<u32> {
        self.current
    }

    pub fn invalidate(&mut self) {
        self.current = None;
    }

    pub fn set_current(&mut self, cylinder: u32) {
        self.current = Some(cylinder);
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// One head's track within the buffer.
    pub fn track(&self, head: u32) -> &[u8] {
        let start = self.geometry.track_offset(head);
        &self.data[start..start + self.geometry.track_bytes()]
    }

    pub fn base_address(&self) -> usize {
        self.data.as_ptr() as usize
    }

    /// Address of a head's track, as the signal generator streams it.
    pub fn track_address(&self, head: u32) -> usize {
        self.base_address() + self.geometry.track_offset(head)
    }
}
