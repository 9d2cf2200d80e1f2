// src/devices.rs

use crate::attrs::{is_valid_name, parse_int};
use crate::diag::Diagnostics;
use crate::tree::Element;
use crate::types::{BROADCAST, MAX_DEVICE_NAME, MAX_SLAVE_ADDRESS};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use serde::Serialize;

const DEVICE_ATTRIBUTES: [&str; 2] = ["address", "name"];

/// A Modbus slave known by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub name: String,
    pub address: u8,
}

/// Bidirectional device name/address map.
///
/// Always contains `broadcast` at address 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRegistry {
    by_name: BTreeMap<String, u8>,
    by_address: BTreeMap<u8, String>,
}

/// Why a device could not be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DeviceConflict {
    Name,
    Address(String),
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    /// A registry holding only the broadcast device.
    pub fn new() -> Self {
        let mut registry = Self {
            by_name: BTreeMap::new(),
            by_address: BTreeMap::new(),
        };
        registry.by_name.insert(BROADCAST.to_string(), 0);
        registry.by_address.insert(0, BROADCAST.to_string());
        registry
    }

    pub fn address_of(&self, name: &str) -> Option<u8> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, address: u8) -> Option<&str> {
        self.by_address.get(&address).map(String::as_str)
    }

    /// Number of entries, broadcast included.
    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Devices in address order, broadcast first.
    pub fn iter(&self) -> impl Iterator<Item = Device> + '_ {
        self.by_address.iter().map(|(&address, name)| Device {
            name: name.clone(),
            address,
        })
    }

    pub(crate) fn insert(&mut self, name: &str, address: u8) -> Result<(), DeviceConflict> {
        if self.by_name.contains_key(name) {
            return Err(DeviceConflict::Name);
        }
        if let Some(existing) = self.by_address.get(&address) {
            return Err(DeviceConflict::Address(existing.clone()));
        }
        self.by_name.insert(name.to_string(), address);
        self.by_address.insert(address, name.to_string());
        Ok(())
    }

    /// Builds the registry from a `<devices>` section.
    ///
    /// Invalid or conflicting entries are reported and skipped; the first
    /// occurrence of a name or address wins.
    pub(crate) fn from_section(section: &Element, diags: &mut Diagnostics) -> Self {
        let mut registry = Self::new();

        for (index, child) in section.indexed_children() {
            if child.tag == "description" {
                continue;
            }
            let path = format!("devices/{}[{}]", child.tag, index);
            if child.tag != "device" {
                diags.error(&path, "Expected <device> tag as child of <devices>");
                continue;
            }
            for attr in child.attr_names() {
                if !DEVICE_ATTRIBUTES.contains(&attr) {
                    diags.warning(&path, format!("Unrecognized attribute '{}' ignored", attr));
                }
            }

            let Some(name) = child.attr("name") else {
                diags.error(&path, "Attribute 'name' missing");
                continue;
            };
            if !is_valid_name(name) {
                diags.error(&path, format!("Device name '{}' is not a valid name", name));
                continue;
            }
            if name.len() > MAX_DEVICE_NAME {
                diags.error(
                    &path,
                    format!(
                        "Device name '{}' longer than {} characters",
                        name, MAX_DEVICE_NAME
                    ),
                );
                continue;
            }

            let Some(raw) = child.attr("address") else {
                diags.error(&path, format!("Attribute 'address' missing for device '{}'", name));
                continue;
            };
            let Some(address) = parse_int(raw) else {
                diags.error(&path, format!("Invalid device address '{}'", raw));
                continue;
            };
            let address = match u8::try_from(address) {
                Ok(a) if a >= 1 => a,
                _ => {
                    diags.error(
                        &path,
                        format!("Device address '{}' must be in range [1,255]", raw),
                    );
                    continue;
                }
            };
            if address > MAX_SLAVE_ADDRESS {
                diags.warning(
                    &path,
                    format!(
                        "Device address {} is in the reserved range [248,255]",
                        address
                    ),
                );
            }

            match registry.insert(name, address) {
                Ok(()) => log::debug!("Device '{}' at address {}", name, address),
                Err(DeviceConflict::Name) => {
                    diags.error(&path, format!("Device name '{}' already defined", name));
                }
                Err(DeviceConflict::Address(existing)) => diags.error(
                    &path,
                    format!(
                        "Device '{}' address {} already assigned to device '{}'",
                        name, address, existing
                    ),
                ),
            }
        }

        if registry.is_empty() {
            diags.warning("devices", "No devices defined other than broadcast");
        }
        registry
    }
}

impl Serialize for DeviceRegistry {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
