// src/compiler.rs

use crate::attrs::{parse_bool, parse_int};
use crate::config::{CommField, CommParams, CommSettings};
use crate::devices::DeviceRegistry;
use crate::diag::{Diagnostics, Skip};
use crate::error::MbccbError;
use crate::image::Image;
use crate::schedule::{CommandRecord, InitRecord, Schedule};
use crate::timeout::bits_to_micros;
use crate::tree::Element;
use crate::types::{
    BROADCAST, CommandFlags, Function, HalType, MAX_DELAY, MAX_DELAY_BITS, ModbusType, PinFlags,
};
use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use log::{debug, info};

const ROOT_TAG: &str = "mesamodbus";

/// The result of a successful compilation.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub schedule: Schedule,
    pub image: Image,
    /// Warnings only; a compilation with errors is rejected.
    pub diagnostics: Diagnostics,
}

/// Compiles a parsed `<mesamodbus>` document.
///
/// # Errors
/// Returns `MbccbError::Rejected` with every diagnostic when the document
/// has at least one error, or `MbccbError::FieldOverflow` if the image
/// cannot be laid out.
pub fn compile(root: &Element) -> Result<Compilation, MbccbError> {
    Compiler::new().compile(root)
}

/// Compilation context.
///
/// Holds everything shared between the stages of one compilation: the
/// resolved defaults, the device registry, the document-wide pin tags and
/// the diagnostics. Several documents can be compiled in one process, each
/// with its own `Compiler`.
#[derive(Debug, Default)]
pub struct Compiler {
    pub(crate) diagnostics: Diagnostics,
    /// Root attribute tokens over the built-in defaults.
    pub(crate) settings: CommSettings,
    pub(crate) defaults: CommParams,
    pub(crate) devices: DeviceRegistry,
    pub(crate) pin_tags: BTreeSet<String>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `root` into a schedule and its image.
    pub fn compile(mut self, root: &Element) -> Result<Compilation, MbccbError> {
        let schedule = self.resolve(root)?;
        let image = Image::build(&schedule)?;
        Ok(Compilation {
            schedule,
            image,
            diagnostics: self.diagnostics,
        })
    }

    /// Resolves `root` into a schedule without laying out the image.
    pub fn resolve(&mut self, root: &Element) -> Result<Schedule, MbccbError> {
        // 1. Root tag and document-level communication parameters.
        if root.tag != ROOT_TAG {
            self.error("", format!("Expected <{}> root tag", ROOT_TAG));
            return Err(self.take_rejection());
        }
        let root_path = format!("<{}>", ROOT_TAG);
        let names: Vec<&str> = CommField::ALL.iter().map(|f| f.name()).collect();
        self.check_attributes(root, &names, &root_path);

        self.settings = CommSettings::defaults().overlay(
            root.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            &CommField::ALL,
        );
        match self.settings.resolve() {
            Ok(params) => self.defaults = params,
            Err(errors) => {
                for e in errors {
                    self.error(&root_path, e.message);
                }
                return Err(self.take_rejection());
            }
        }
        debug!("Document defaults: {:?}", self.defaults);

        // 2. Sections, devices first.
        let mut devices_seen = false;
        let mut init: Option<Vec<InitRecord>> = None;
        let mut commands: Option<Vec<CommandRecord>> = None;
        for section in &root.children {
            match section.tag.as_str() {
                "description" => {}
                "devices" => {
                    if devices_seen {
                        self.error("devices", "Multiple <devices> tags");
                        continue;
                    }
                    devices_seen = true;
                    self.devices = DeviceRegistry::from_section(section, &mut self.diagnostics);
                }
                _ if !devices_seen => {
                    self.error(
                        &section.tag,
                        "The <devices> tag must be declared first",
                    );
                    break;
                }
                "initlist" => {
                    if init.is_some() {
                        self.error("initlist", "Multiple <initlist> tags");
                        continue;
                    }
                    init = Some(self.build_init_list(section));
                }
                "commands" => {
                    if commands.is_some() {
                        self.error("commands", "Multiple <commands> tags");
                        continue;
                    }
                    commands = Some(self.build_command_list(section));
                }
                other => {
                    let message = format!("Invalid/unknown tag '{}'", other);
                    self.error(&root_path, message);
                }
            }
        }
        if !devices_seen {
            self.warning("devices", "No devices defined other than broadcast");
        }

        if self.diagnostics.has_errors() {
            return Err(self.take_rejection());
        }

        let schedule = Schedule {
            params: self.defaults,
            devices: self.devices.clone(),
            init: init.unwrap_or_default(),
            commands: commands.unwrap_or_default(),
        };
        info!(
            "Resolved {} device(s), {} init record(s), {} command record(s), {} pin(s)",
            schedule.devices.len() - 1,
            schedule.init.len(),
            schedule.commands.len(),
            schedule.pin_count()
        );
        Ok(schedule)
    }

    /// Diagnostics gathered so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn take_rejection(&mut self) -> MbccbError {
        MbccbError::Rejected(core::mem::take(&mut self.diagnostics))
    }

    // --- Diagnostics helpers ---

    pub(crate) fn error(&mut self, path: &str, message: impl Into<String>) {
        self.diagnostics.error(path, message);
    }

    pub(crate) fn warning(&mut self, path: &str, message: impl Into<String>) {
        self.diagnostics.warning(path, message);
    }

    /// Warns about every attribute of `el` not listed in `allowed`.
    pub(crate) fn check_attributes(&mut self, el: &Element, allowed: &[&str], path: &str) {
        for name in el.attr_names() {
            if !allowed.contains(&name) {
                let message = format!("Unrecognized attribute '{}' ignored", name);
                self.diagnostics.warning(path, message);
            }
        }
    }

    // --- Attribute readers ---
    //
    // Each returns `Ok(None)` when the attribute is absent and `Err(Skip)`
    // after reporting an invalid value.

    pub(crate) fn int_attr(
        &mut self,
        el: &Element,
        name: &str,
        path: &str,
    ) -> Result<Option<i128>, Skip> {
        let Some(raw) = el.attr(name) else {
            return Ok(None);
        };
        match parse_int(raw) {
            Some(v) => Ok(Some(v)),
            None => {
                self.error(
                    path,
                    format!("Attribute '{}' has invalid integer value '{}'", name, raw),
                );
                Err(Skip)
            }
        }
    }

    /// An integer attribute that must lie in `[min, max]`.
    pub(crate) fn ranged_attr(
        &mut self,
        el: &Element,
        name: &str,
        min: i128,
        max: i128,
        path: &str,
    ) -> Result<Option<i128>, Skip> {
        match self.int_attr(el, name, path)? {
            Some(v) if v < min || v > max => {
                self.error(
                    path,
                    format!(
                        "Attribute '{}' value {} out of range [{},{}]",
                        name, v, min, max
                    ),
                );
                Err(Skip)
            }
            other => Ok(other),
        }
    }

    pub(crate) fn bool_attr(
        &mut self,
        el: &Element,
        name: &str,
        path: &str,
    ) -> Result<Option<bool>, Skip> {
        let Some(raw) = el.attr(name) else {
            return Ok(None);
        };
        match parse_bool(raw) {
            Some(b) => Ok(Some(b)),
            None => {
                self.error(
                    path,
                    format!("Attribute '{}' has invalid boolean value '{}'", name, raw),
                );
                Err(Skip)
            }
        }
    }

    /// The required `device` attribute, resolved to its bus address.
    pub(crate) fn device_attr(&mut self, el: &Element, path: &str) -> Result<(String, u8), Skip> {
        let Some(name) = el.attr("device") else {
            self.error(path, "Attribute 'device' missing");
            return Err(Skip);
        };
        match self.devices.address_of(name) {
            Some(address) => Ok((name.to_string(), address)),
            None => {
                self.error(path, format!("Device '{}' not defined", name));
                Err(Skip)
            }
        }
    }

    /// The required `function` attribute, by name or numeric code.
    pub(crate) fn function_attr(&mut self, el: &Element, path: &str) -> Result<Function, Skip> {
        let Some(raw) = el.attr("function") else {
            self.error(path, "Attribute 'function' missing");
            return Err(Skip);
        };
        let function = Function::from_name(raw.trim()).or_else(|| {
            parse_int(raw)
                .and_then(|code| u8::try_from(code).ok())
                .and_then(|code| Function::try_from(code).ok())
        });
        function.ok_or_else(|| {
            self.error(path, format!("Invalid or unsupported function '{}'", raw));
            Skip
        })
    }

    /// The required `address` attribute.
    pub(crate) fn address_attr(&mut self, el: &Element, path: &str) -> Result<u16, Skip> {
        match self.ranged_attr(el, "address", 0, 0xffff, path)? {
            Some(v) => Ok(v as u16),
            None => {
                self.error(path, "Attribute 'address' missing");
                Err(Skip)
            }
        }
    }

    /// A `delay` record value in microseconds.
    pub(crate) fn delay_attr(&mut self, el: &Element, path: &str) -> Result<u32, Skip> {
        let delay = self.ranged_attr(el, "delay", 0, MAX_DELAY.into(), path)?;
        Ok(delay.unwrap_or_default() as u32)
    }

    /// `timeout` or `timeoutbits`, in microseconds, falling back to the
    /// document `timeout`. 0 means `auto`. `timeoutbits` converts at
    /// `baudrate`.
    pub(crate) fn timeout_attr(
        &mut self,
        el: &Element,
        baudrate: u32,
        path: &str,
    ) -> Result<u32, Skip> {
        if el.has_attr("timeout") && el.has_attr("timeoutbits") {
            self.warning(
                path,
                "Both 'timeout' and 'timeoutbits' specified, using 'timeout'",
            );
        }
        if let Some(raw) = el.attr("timeout") {
            if raw.trim().eq_ignore_ascii_case("auto") {
                return Ok(0);
            }
            let v = self.ranged_attr(el, "timeout", 1, MAX_DELAY.into(), path)?;
            return Ok(v.unwrap_or_default() as u32);
        }
        match self.ranged_attr(el, "timeoutbits", 0, MAX_DELAY_BITS.into(), path)? {
            Some(bits) => Ok(bits_to_micros(bits as u32, baudrate)),
            None => Ok(self.defaults.timeout),
        }
    }

    pub(crate) fn modbus_type_attr(
        &mut self,
        el: &Element,
        path: &str,
    ) -> Result<Option<ModbusType>, Skip> {
        let Some(raw) = el.attr("modbustype") else {
            return Ok(None);
        };
        match ModbusType::from_name(raw.trim()) {
            Some(t) => Ok(Some(t)),
            None => {
                self.error(path, format!("Invalid modbustype '{}'", raw));
                Err(Skip)
            }
        }
    }

    pub(crate) fn hal_type_attr(
        &mut self,
        el: &Element,
        path: &str,
    ) -> Result<Option<HalType>, Skip> {
        let Some(raw) = el.attr("haltype") else {
            return Ok(None);
        };
        match HalType::from_name(raw.trim()) {
            Some(t) => Ok(Some(t)),
            None => {
                self.error(path, format!("Invalid haltype '{}'", raw));
                Err(Skip)
            }
        }
    }

    /// Applies the boolean command flag attributes over `flags`.
    ///
    /// `bcanswer` is only legal on the broadcast device.
    pub(crate) fn command_flags(
        &mut self,
        el: &Element,
        device: &str,
        mut flags: CommandFlags,
        path: &str,
    ) -> Result<CommandFlags, Skip> {
        for (name, flag) in [
            ("timesout", CommandFlags::TIMESOUT),
            ("bcanswer", CommandFlags::BCANSWER),
            ("noanswer", CommandFlags::NOANSWER),
            ("resend", CommandFlags::RESEND),
            ("writeflush", CommandFlags::WRITE_FLUSH),
        ] {
            if let Some(on) = self.bool_attr(el, name, path)? {
                flags.set(flag, on);
            }
        }
        if flags.contains(CommandFlags::BCANSWER) && device != BROADCAST {
            self.error(
                path,
                "Attribute 'bcanswer' only allowed on the broadcast device",
            );
            return Err(Skip);
        }
        Ok(flags)
    }

    /// Applies the `scale`/`clamp` attributes over `flags`.
    pub(crate) fn pin_flags(
        &mut self,
        el: &Element,
        mut flags: PinFlags,
        path: &str,
    ) -> Result<PinFlags, Skip> {
        for (name, flag) in [("scale", PinFlags::SCALE), ("clamp", PinFlags::CLAMP)] {
            if let Some(on) = self.bool_attr(el, name, path)? {
                flags.set(flag, on);
            }
        }
        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler() -> Compiler {
        let mut c = Compiler::new();
        c.devices
            .insert("drive", 5)
            .expect("fresh registry accepts a device");
        c
    }

    #[test]
    fn test_function_attr_names_and_codes() {
        let mut c = compiler();
        let by_name = Element::new("command").with_attr("function", "r_inputregs");
        let by_code = Element::new("command").with_attr("function", "0x10");
        let bad = Element::new("command").with_attr("function", "7");
        assert_eq!(c.function_attr(&by_name, "p"), Ok(Function::ReadInputRegs));
        assert_eq!(c.function_attr(&by_code, "p"), Ok(Function::WriteRegisters));
        assert_eq!(c.function_attr(&bad, "p"), Err(Skip));
        assert_eq!(c.diagnostics.error_count(), 1);
    }

    #[test]
    fn test_timeout_attr_variants() {
        let mut c = compiler();
        let explicit = Element::new("c").with_attr("timeout", "25000");
        let auto = Element::new("c").with_attr("timeout", "AUTO");
        let bits = Element::new("c").with_attr("timeoutbits", "96");
        let both = Element::new("c")
            .with_attr("timeout", "30000")
            .with_attr("timeoutbits", "96");
        let bad = Element::new("c").with_attr("timeout", "0");

        assert_eq!(c.timeout_attr(&explicit, 9600, "p"), Ok(25_000));
        assert_eq!(c.timeout_attr(&auto, 9600, "p"), Ok(0));
        assert_eq!(c.timeout_attr(&bits, 9600, "p"), Ok(10_000));
        assert_eq!(c.timeout_attr(&Element::new("c"), 9600, "p"), Ok(0));
        assert_eq!(c.timeout_attr(&both, 9600, "p"), Ok(30_000));
        assert_eq!(c.diagnostics.warning_count(), 1);
        assert_eq!(c.timeout_attr(&bad, 9600, "p"), Err(Skip));

        // Absent attributes fall back to the document timeout; `auto` does not.
        c.defaults.timeout = 40_000;
        assert_eq!(c.timeout_attr(&Element::new("c"), 9600, "p"), Ok(40_000));
        assert_eq!(c.timeout_attr(&auto, 9600, "p"), Ok(0));
        assert_eq!(c.timeout_attr(&bits, 9600, "p"), Ok(10_000));
    }

    #[test]
    fn test_bcanswer_needs_broadcast() {
        let mut c = compiler();
        let el = Element::new("command").with_attr("bcanswer", "1");
        assert_eq!(
            c.command_flags(&el, "broadcast", CommandFlags::empty(), "p"),
            Ok(CommandFlags::BCANSWER)
        );
        assert_eq!(
            c.command_flags(&el, "drive", CommandFlags::empty(), "p"),
            Err(Skip)
        );
    }

    #[test]
    fn test_flags_can_clear_defaults() {
        let mut c = compiler();
        let el = Element::new("command")
            .with_attr("writeflush", "false")
            .with_attr("timesout", "T");
        assert_eq!(
            c.command_flags(&el, "drive", CommandFlags::WRITE_FLUSH, "p"),
            Ok(CommandFlags::TIMESOUT)
        );
        let pin = Element::new("pin").with_attr("clamp", "0");
        assert_eq!(
            c.pin_flags(&pin, PinFlags::SCALE | PinFlags::CLAMP, "p"),
            Ok(PinFlags::SCALE)
        );
    }

    #[test]
    fn test_wrong_root_is_rejected() {
        let err = compile(&Element::new("modbus")).unwrap_err();
        let diags = err.diagnostics().unwrap();
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn test_root_config_errors_are_all_reported() {
        let root = Element::new("mesamodbus")
            .with_attr("baudrate", "12")
            .with_attr("parity", "Q")
            .with_attr("colour", "blue");
        let err = compile(&root).unwrap_err();
        let diags = err.diagnostics().unwrap();
        assert_eq!(diags.error_count(), 2);
        assert_eq!(diags.warning_count(), 1);
    }
}
