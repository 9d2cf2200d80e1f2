// src/commands.rs

use crate::attrs::is_valid_name;
use crate::compiler::Compiler;
use crate::diag::Skip;
use crate::schedule::{Command, CommandRecord, Pin};
use crate::timeout::estimate_timeout;
use crate::tree::Element;
use crate::types::{
    BROADCAST, CommandFlags, Function, HalType, INTERVAL_ONCE, MAX_COMMAND_NAME, MAX_INTERVAL,
    MAX_PIN_NAME, MAX_SKIP, MAX_TYPED_PINS, ModbusType, PinFlags, SKIP_WARN,
};
use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use log::debug;

const DELAY_ATTRIBUTES: [&str; 1] = ["delay"];
const COMMAND_ATTRIBUTES: [&str; 18] = [
    "address",
    "bcanswer",
    "clamp",
    "count",
    "delay",
    "device",
    "function",
    "haltype",
    "interval",
    "modbustype",
    "name",
    "noanswer",
    "resend",
    "scale",
    "timeout",
    "timeoutbits",
    "timesout",
    "writeflush",
];
const PIN_ATTRIBUTES: [&str; 5] = ["clamp", "haltype", "modbustype", "name", "scale"];
const SKIP_ATTRIBUTES: [&str; 1] = ["skip"];

/// Types and flags a command hands down to pins that do not override them.
#[derive(Debug, Clone, Copy)]
struct PinDefaults {
    modbus_type: Option<ModbusType>,
    hal_type: Option<HalType>,
    flags: PinFlags,
}

/// Pins of one command while they are being collected.
struct PinBlock {
    pins: Vec<Pin>,
    /// Tags claimed by this command, committed to the document set only
    /// when the command is accepted.
    tags: BTreeSet<String>,
    /// Next free register (or coil) offset.
    offset: u32,
}

impl PinBlock {
    fn push(&mut self, pin: Pin, words: u16) {
        self.offset += u32::from(words);
        self.tags.insert(pin.tag.clone());
        self.pins.push(pin);
    }

    fn offset16(&self) -> u16 {
        u16::try_from(self.offset).unwrap_or(u16::MAX)
    }
}

fn skip_allowed(function: Function) -> bool {
    matches!(
        function,
        Function::ReadRegisters | Function::ReadInputRegs | Function::WriteRegisters
    )
}

impl Compiler {
    /// Builds the command list from a `<commands>` section.
    pub(crate) fn build_command_list(&mut self, section: &Element) -> Vec<CommandRecord> {
        let mut records = Vec::new();
        for (index, child) in section.indexed_children() {
            if child.tag == "description" {
                continue;
            }
            let path = format!("commands/{}[{}]", child.tag, index);
            if child.tag != "command" {
                self.error(&path, "Expected <command> tag as child of <commands>");
                continue;
            }
            let record = if child.has_attr("delay") {
                self.check_attributes(child, &DELAY_ATTRIBUTES, &path);
                self.delay_attr(child, &path).map(CommandRecord::Delay)
            } else {
                self.check_attributes(child, &COMMAND_ATTRIBUTES, &path);
                self.command(child, &path).map(CommandRecord::Command)
            };
            if let Ok(record) = record {
                debug!("Command {}: {:?}", records.len() + 1, record);
                records.push(record);
            }
        }
        records
    }

    fn command(&mut self, el: &Element, path: &str) -> Result<Command, Skip> {
        // 1. Target, timing and addressing.
        let (device, mbid) = self.device_attr(el, path)?;
        let timeout = self.timeout_attr(el, self.defaults.baudrate, path)?;
        let interval = match el.attr("interval") {
            Some(raw) if raw.trim().eq_ignore_ascii_case("once") => INTERVAL_ONCE,
            Some(_) => self
                .ranged_attr(el, "interval", 0, MAX_INTERVAL.into(), path)?
                .unwrap_or_default() as u32,
            None => self.defaults.interval,
        };
        let address = self.address_attr(el, path)?;
        let function = self.function_attr(el, path)?;
        if device == BROADCAST && !function.is_write() {
            self.error(path, "Broadcast commands must use a write function");
            return Err(Skip);
        }

        let count = if function.is_single() {
            if el.has_attr("count") {
                self.warning(
                    path,
                    format!("Attribute 'count' ignored for function {}", function),
                );
            }
            Some(1)
        } else {
            // 0 is the same as leaving it out.
            self.int_attr(el, "count", path)?.filter(|&c| c != 0)
        };

        // 2. Defaults and flags.
        let mut defaults = self.pin_defaults(el, function, path)?;

        let mut base = CommandFlags::empty();
        base.set(CommandFlags::WRITE_FLUSH, self.defaults.writeflush);
        let mut flags = self.command_flags(el, &device, base, path)?;
        if interval == INTERVAL_ONCE && flags.contains(CommandFlags::RESEND) {
            self.error(
                path,
                "Attribute 'resend' cannot be combined with interval 'once'",
            );
            return Err(Skip);
        }
        if !function.is_write() {
            flags.remove(CommandFlags::WRITE_FLUSH);
        }

        if let (Some(m), Some(h)) = (defaults.modbus_type, defaults.hal_type) {
            if function.is_register() {
                self.check_types(m, h, &mut defaults.flags, path, false);
            }
        }

        let name = match el.attr("name") {
            Some(n) if !is_valid_name(n) => {
                self.error(path, format!("Command name '{}' is not a valid name", n));
                return Err(Skip);
            }
            Some(n) if n.len() > MAX_COMMAND_NAME => {
                self.error(
                    path,
                    format!(
                        "Command name '{}' longer than {} characters",
                        n, MAX_COMMAND_NAME
                    ),
                );
                return Err(Skip);
            }
            other => other.map(str::to_string),
        };

        // 3. Explicit pins and skips, in document order.
        let mut block = PinBlock {
            pins: Vec::new(),
            tags: BTreeSet::new(),
            offset: 0,
        };
        for (index, child) in el.indexed_children() {
            if child.tag == "description" {
                continue;
            }
            let pin_path = format!("{}/{}[{}]", path, child.tag, index);
            if child.tag != "pin" {
                self.error(
                    &pin_path,
                    format!("Expected <pin> tag instead of <{}>", child.tag),
                );
                return Err(Skip);
            }
            if child.has_attr("skip") {
                self.check_attributes(child, &SKIP_ATTRIBUTES, &pin_path);
                if !skip_allowed(function) {
                    self.error(
                        &pin_path,
                        format!("Attribute 'skip' not allowed for function {}", function),
                    );
                    return Err(Skip);
                }
                let skip = self
                    .ranged_attr(child, "skip", 1, MAX_SKIP.into(), &pin_path)?
                    .unwrap_or(1);
                if skip > i128::from(SKIP_WARN) {
                    self.warning(
                        &pin_path,
                        format!(
                            "Skipping {} registers, splitting the command may be more efficient",
                            skip
                        ),
                    );
                }
                block.offset += skip as u32;
                continue;
            }
            self.check_attributes(child, &PIN_ATTRIBUTES, &pin_path);
            self.explicit_pin(
                child,
                function,
                &device,
                name.as_deref(),
                &defaults,
                &mut block,
                &pin_path,
            )?;
        }

        // 4. Count and generated pins.
        let max = function.max_count();
        let count = match count {
            None if block.pins.is_empty() => {
                self.error(path, "Attribute 'count' missing and no <pin> tags");
                return Err(Skip);
            }
            None => block.pins.len(),
            Some(c) if c < block.pins.len() as i128 => {
                self.error(
                    path,
                    format!(
                        "Number of pins {} larger than count {}",
                        block.pins.len(),
                        c
                    ),
                );
                return Err(Skip);
            }
            Some(c) if c < 1 || c > i128::from(max) => {
                self.error(
                    path,
                    format!("Count {} out of range [1,{}]", c, max),
                );
                return Err(Skip);
            }
            Some(c) => c as usize,
        };

        if block.pins.len() < count {
            let (Some(mtype), Some(htype)) = (defaults.modbus_type, defaults.hal_type) else {
                let missing = if defaults.modbus_type.is_none() {
                    "modbustype"
                } else {
                    "haltype"
                };
                self.error(
                    path,
                    format!("Attribute '{}' missing, needed to generate pins", missing),
                );
                return Err(Skip);
            };
            let Some(cmd_name) = name.as_deref() else {
                self.error(path, "Attribute 'name' missing, needed to generate pins");
                return Err(Skip);
            };
            while block.pins.len() < count {
                let tag = format!("{}.{}-{:02}", device, cmd_name, block.pins.len());
                self.claim_tag(&tag, &block, path)?;
                let pin = if function.is_bit() {
                    Pin {
                        tag,
                        modbus_type: ModbusType::U_AB,
                        hal_type: HalType::Bit,
                        flags: PinFlags::empty(),
                        offset: block.offset16(),
                    }
                } else {
                    self.check_alignment(mtype, block.offset, path);
                    Pin {
                        tag,
                        modbus_type: mtype,
                        hal_type: htype,
                        flags: defaults.flags,
                        offset: block.offset16(),
                    }
                };
                let words = if function.is_bit() { 1 } else { mtype.words() };
                block.push(pin, words);
            }
        }

        // 5. Block bounds.
        if block.offset > u32::from(max) {
            self.error(
                path,
                format!(
                    "Number of registers {} out of range [1,{}]",
                    block.offset, max
                ),
            );
            return Err(Skip);
        }
        if u32::from(address) + block.offset > 0x1_0000 {
            self.error(
                path,
                format!(
                    "Accessing {} registers from address {} wraps the address counter",
                    block.offset, address
                ),
            );
            return Err(Skip);
        }
        if function.is_register() && block.pins.len() > MAX_TYPED_PINS {
            self.error(
                path,
                format!(
                    "Too many pins ({}), a register command holds at most {}",
                    block.pins.len(),
                    MAX_TYPED_PINS
                ),
            );
            return Err(Skip);
        }

        let timeout = match timeout {
            0 => estimate_timeout(function, block.offset, ModbusType::U_AB, &self.defaults),
            t => t,
        };
        let registers = block.offset16();
        self.pin_tags.append(&mut block.tags);

        Ok(Command {
            name,
            device,
            mbid,
            function,
            address,
            count: block.pins.len() as u16,
            registers,
            interval,
            timeout,
            flags,
            pins: block.pins,
        })
    }

    /// Reads the command-level `modbustype`/`haltype` and pin flags.
    fn pin_defaults(
        &mut self,
        el: &Element,
        function: Function,
        path: &str,
    ) -> Result<PinDefaults, Skip> {
        if function.is_bit() {
            if el.has_attr("modbustype") || el.has_attr("haltype") {
                self.warning(
                    path,
                    format!(
                        "Attributes 'modbustype' and 'haltype' ignored for function {}",
                        function
                    ),
                );
            }
            return Ok(PinDefaults {
                modbus_type: Some(ModbusType::U_AB),
                hal_type: Some(HalType::Bit),
                flags: PinFlags::empty(),
            });
        }

        let modbus_type = self.modbus_type_attr(el, path)?;
        let hal_type = self.hal_type_attr(el, path)?;
        if function == Function::WriteRegister && modbus_type.is_some_and(|t| t.byte_size() != 2)
        {
            self.error(path, "Function W_REGISTER requires a 16-bit modbustype");
            return Err(Skip);
        }
        let mut flags = PinFlags::CLAMP;
        flags.set(PinFlags::SCALE, hal_type == Some(HalType::Float));
        let flags = self.pin_flags(el, flags, path)?;
        Ok(PinDefaults {
            modbus_type,
            hal_type,
            flags,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn explicit_pin(
        &mut self,
        el: &Element,
        function: Function,
        device: &str,
        cmd_name: Option<&str>,
        defaults: &PinDefaults,
        block: &mut PinBlock,
        path: &str,
    ) -> Result<(), Skip> {
        let pin_name = match (el.attr("name"), cmd_name) {
            (Some(n), _) if !is_valid_name(n) => {
                self.error(path, format!("Pin name '{}' is not a valid name", n));
                return Err(Skip);
            }
            (Some(n), _) => n.to_string(),
            (None, Some(cmd)) => format!("{}-{:02}", cmd, block.pins.len()),
            (None, None) => {
                self.error(path, "Attribute 'name' missing on pin and command");
                return Err(Skip);
            }
        };
        if pin_name.len() > MAX_PIN_NAME {
            self.error(
                path,
                format!(
                    "Pin name '{}' longer than {} characters",
                    pin_name, MAX_PIN_NAME
                ),
            );
            return Err(Skip);
        }
        let tag = format!("{}.{}", device, pin_name);
        self.claim_tag(&tag, block, path)?;

        if function.is_bit() {
            let pin = Pin {
                tag,
                modbus_type: ModbusType::U_AB,
                hal_type: HalType::Bit,
                flags: PinFlags::empty(),
                offset: block.offset16(),
            };
            block.push(pin, 1);
            return Ok(());
        }

        let modbus_type = self.modbus_type_attr(el, path)?.or(defaults.modbus_type);
        let hal_type = self.hal_type_attr(el, path)?.or(defaults.hal_type);
        let Some(mtype) = modbus_type else {
            self.error(path, "No 'modbustype' defined in command or pin");
            return Err(Skip);
        };
        let Some(htype) = hal_type else {
            self.error(path, "No 'haltype' defined in command or pin");
            return Err(Skip);
        };
        if htype == HalType::Bit && !mtype.is_unsigned() {
            self.error(
                path,
                format!("HAL_BIT pins need an unsigned modbustype, not {}", mtype),
            );
            return Err(Skip);
        }
        let mut flags = self.pin_flags(el, defaults.flags, path)?;
        self.check_types(mtype, htype, &mut flags, path, true);
        self.check_alignment(mtype, block.offset, path);

        let pin = Pin {
            tag,
            modbus_type: mtype,
            hal_type: htype,
            flags,
            offset: block.offset16(),
        };
        block.push(pin, mtype.words());
        Ok(())
    }

    /// Fails if `tag` is taken, document-wide or within the current command.
    fn claim_tag(&mut self, tag: &str, block: &PinBlock, path: &str) -> Result<(), Skip> {
        if self.pin_tags.contains(tag) || block.tags.contains(tag) {
            self.error(path, format!("Pin name '{}' already in use", tag));
            return Err(Skip);
        }
        Ok(())
    }

    /// Advisory checks between a wire type and a HAL type. Clears `SCALE`
    /// when the HAL type is unsigned.
    fn check_types(
        &mut self,
        mtype: ModbusType,
        htype: HalType,
        flags: &mut PinFlags,
        path: &str,
        pin_level: bool,
    ) {
        if htype == HalType::Bit {
            return;
        }
        if flags.contains(PinFlags::SCALE) && htype.is_unsigned() {
            self.warning(
                path,
                format!("Scaling disabled for unsigned HAL type {}", htype),
            );
            flags.remove(PinFlags::SCALE);
        }
        if !flags.contains(PinFlags::SCALE) {
            let mismatch = (mtype.is_signed() && htype.is_unsigned())
                || (mtype.is_unsigned() && htype.is_signed());
            // A narrower unsigned value always fits a wider signed pin.
            let fits = pin_level && mtype.byte_size() < htype.byte_size();
            if mismatch && !fits {
                self.warning(
                    path,
                    format!("Signedness mismatch between {} and {}", mtype, htype),
                );
            }
        }
        if mtype.byte_size() == 8 && htype.byte_size() == 4 {
            self.warning(
                path,
                format!("64-bit {} does not fit 32-bit {}", mtype, htype),
            );
        }
    }

    fn check_alignment(&mut self, mtype: ModbusType, offset: u32, path: &str) {
        let words = u32::from(mtype.words());
        if words > 1 && offset % words != 0 {
            self.warning(
                path,
                format!(
                    "{} value at register offset {} is not naturally aligned",
                    mtype, offset
                ),
            );
        }
    }
}
