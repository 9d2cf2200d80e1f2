// src/initlist.rs

use crate::attrs::{parse_float, parse_int};
use crate::compiler::Compiler;
use crate::config::{CommField, CommParams, CommSettings};
use crate::diag::Skip;
use crate::encode::{encode_float, encode_integer};
use crate::schedule::{InitFrame, InitRecord};
use crate::timeout::estimate_timeout;
use crate::tree::Element;
use crate::types::{CommandFlags, Function, ModbusType};
use alloc::format;
use alloc::vec;
use alloc::vec::Vec;
use log::debug;

const DELAY_ATTRIBUTES: [&str; 1] = ["delay"];
const INIT_ATTRIBUTES: [&str; 10] = [
    "address",
    "bcanswer",
    "count",
    "delay",
    "device",
    "function",
    "noanswer",
    "timeout",
    "timeoutbits",
    "timesout",
];
const DATA_ATTRIBUTES: [&str; 2] = ["modbustype", "value"];

/// Longest payload a `W_REGISTERS` packet length byte can describe.
const MAX_PACKET_DATA: usize = 255 - 7;

/// Encoded `<data>` children of an init frame.
struct Payload {
    bytes: Vec<u8>,
    /// Byte width of each `<data>` element, in order.
    sizes: Vec<usize>,
}

impl Compiler {
    /// Builds the init list from an `<initlist>` section.
    ///
    /// Records that fail validation are reported and left out. If the list
    /// leaves the serial port on non-default parameters, a record restoring
    /// the document defaults is appended.
    pub(crate) fn build_init_list(&mut self, section: &Element) -> Vec<InitRecord> {
        let mut records = Vec::new();
        let mut current = self.defaults;

        for (index, child) in section.indexed_children() {
            if child.tag == "description" {
                continue;
            }
            let path = format!("initlist/{}[{}]", child.tag, index);
            if child.tag != "command" {
                self.error(&path, "Expected <command> tag as child of <initlist>");
                continue;
            }
            if let Ok(record) = self.init_record(child, &path, &mut current) {
                debug!("Init {}: {:?}", records.len() + 1, record);
                records.push(record);
            }
        }

        if !current.same_rate(&self.defaults) {
            self.warning(
                "initlist",
                "Communication parameters not restored at end of init list, adding a reset to defaults",
            );
            records.push(InitRecord::CommsOverride(self.defaults));
        }
        records
    }

    fn init_record(
        &mut self,
        el: &Element,
        path: &str,
        current: &mut CommParams,
    ) -> Result<InitRecord, Skip> {
        if el.has_attr("delay") {
            self.check_attributes(el, &DELAY_ATTRIBUTES, path);
            return self.delay_attr(el, path).map(InitRecord::Delay);
        }

        if CommField::RATE.iter().any(|f| el.has_attr(f.name())) {
            let names: Vec<&str> = CommField::RATE.iter().map(|f| f.name()).collect();
            self.check_attributes(el, &names, path);
            let attributes = el.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()));
            let settings = CommSettings::defaults().overlay(attributes, &CommField::RATE);
            return match settings.resolve() {
                Ok(params) => {
                    *current = params;
                    Ok(InitRecord::CommsOverride(params))
                }
                Err(errors) => {
                    for e in errors {
                        self.error(path, e.message);
                    }
                    self.error(path, "Invalid communication parameters");
                    Err(Skip)
                }
            };
        }

        self.check_attributes(el, &INIT_ATTRIBUTES, path);
        self.init_frame(el, path, current).map(InitRecord::Frame)
    }

    fn init_frame(
        &mut self,
        el: &Element,
        path: &str,
        current: &CommParams,
    ) -> Result<InitFrame, Skip> {
        let (device, mbid) = self.device_attr(el, path)?;
        let flags = self.command_flags(el, &device, CommandFlags::empty(), path)?;
        if !(flags & !CommandFlags::INIT_MASK).is_empty() {
            self.warning(
                path,
                format!(
                    "Flags {:?} have no effect on init commands",
                    (flags & !CommandFlags::INIT_MASK).names()
                ),
            );
        }
        let timeout = self.timeout_attr(el, current.baudrate, path)?;
        let function = self.function_attr(el, path)?;
        let address = self.address_attr(el, path)?;
        let payload = self.init_payload(el, function, path)?;

        let count: i128 = if function.is_write() {
            if payload.sizes.is_empty() {
                self.error(path, "Write function requires one or more <data> tags");
                return Err(Skip);
            }
            if el.has_attr("count") {
                self.warning(path, "Attribute 'count' ignored for write functions");
            }
            match function {
                Function::WriteCoils => payload.sizes.len() as i128,
                _ => (payload.bytes.len() / 2) as i128,
            }
        } else {
            match self.int_attr(el, "count", path)? {
                Some(count) => count,
                None => {
                    self.error(path, "Attribute 'count' missing");
                    return Err(Skip);
                }
            }
        };

        let room = 0x1_0000 - i128::from(address);
        let max = i128::from(function.max_count()).min(room);
        if count < 1 || count > max {
            let message = if count > room {
                format!(
                    "Count {} from address {} wraps the address counter",
                    count, address
                )
            } else {
                format!("Count {} out of range [1,{}]", count, max)
            };
            self.error(path, message);
            return Err(Skip);
        }
        if function == Function::WriteRegisters && payload.bytes.len() > MAX_PACKET_DATA {
            self.error(
                path,
                format!(
                    "Data of {} bytes does not fit one packet (max {})",
                    payload.bytes.len(),
                    MAX_PACKET_DATA
                ),
            );
            return Err(Skip);
        }
        let count = count as u16;

        let timeout = match timeout {
            0 => estimate_timeout(function, count.into(), ModbusType::U_AB, current),
            t => t,
        };
        Ok(InitFrame {
            device,
            mbid,
            function,
            address,
            count,
            payload: payload.bytes,
            element_sizes: payload.sizes,
            timeout,
            flags,
        })
    }

    /// Encodes the `<data>` children of an init frame.
    fn init_payload(
        &mut self,
        el: &Element,
        function: Function,
        path: &str,
    ) -> Result<Payload, Skip> {
        let mut payload = Payload {
            bytes: Vec::new(),
            sizes: Vec::new(),
        };
        for (index, child) in el.indexed_children() {
            if child.tag == "description" {
                continue;
            }
            let data_path = format!("{}/{}[{}]", path, child.tag, index);
            if child.tag != "data" {
                self.error(
                    &data_path,
                    format!("Expected <data> tag instead of <{}>", child.tag),
                );
                return Err(Skip);
            }
            if !function.is_write() {
                self.error(&data_path, "Only write functions can have <data> tags");
                return Err(Skip);
            }
            self.check_attributes(child, &DATA_ATTRIBUTES, &data_path);
            let bytes = self.data_value(child, function, &data_path)?;
            payload.bytes.extend_from_slice(&bytes);
            payload.sizes.push(bytes.len());
        }
        Ok(payload)
    }

    /// Encodes one `<data value=".." [modbustype=".."]/>`.
    fn data_value(
        &mut self,
        data: &Element,
        function: Function,
        path: &str,
    ) -> Result<Vec<u8>, Skip> {
        let mtype = self.modbus_type_attr(data, path)?;
        let Some(raw) = data.attr("value") else {
            self.error(path, "Attribute 'value' missing");
            return Err(Skip);
        };

        let encoded = match function {
            Function::WriteCoil => {
                if mtype.is_some_and(|t| t != ModbusType::U_AB) {
                    self.warning(path, "Attribute 'modbustype' ignored for W_COIL data");
                }
                let value = self.data_integer(raw, path)?;
                if value != 0 && value != 0xff00 {
                    self.warning(
                        path,
                        format!("W_COIL value {:#x} should be 0 or 0xff00", value),
                    );
                }
                encode_integer(value, ModbusType::U_AB)
            }
            Function::WriteCoils => {
                if mtype.is_some() {
                    self.error(path, "Attribute 'modbustype' not allowed for W_COILS data");
                    return Err(Skip);
                }
                match self.data_integer(raw, path)? {
                    v @ (0 | 1) => Ok(vec![v as u8]),
                    v => Err(format!("W_COILS value {} must be 0 or 1", v)),
                }
            }
            Function::WriteRegister | Function::WriteRegisters => {
                let mtype = mtype.unwrap_or(ModbusType::U_AB);
                if function == Function::WriteRegister && mtype.byte_size() != 2 {
                    self.error(
                        path,
                        format!("W_REGISTER data must be a 16-bit type, not {}", mtype),
                    );
                    return Err(Skip);
                }
                if mtype.is_float() {
                    let Some(value) = parse_float(raw) else {
                        self.error(path, format!("Invalid float value '{}'", raw));
                        return Err(Skip);
                    };
                    encode_float(value, mtype)
                } else {
                    let value = self.data_integer(raw, path)?;
                    encode_integer(value, mtype)
                }
            }
            Function::ReadCoils
            | Function::ReadInputs
            | Function::ReadRegisters
            | Function::ReadInputRegs => Err(format!("Function {} takes no data", function)),
        };

        encoded.map_err(|message| {
            self.error(path, message);
            Skip
        })
    }

    fn data_integer(&mut self, raw: &str, path: &str) -> Result<i128, Skip> {
        parse_int(raw).ok_or_else(|| {
            self.error(path, format!("Invalid integer value '{}'", raw));
            Skip
        })
    }
}
