// src/schedule.rs

use crate::config::{CommParams, Parity};
use crate::devices::DeviceRegistry;
use crate::types::{CommandFlags, Function, HalType, ModbusType, PinFlags, ValueKind};
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use serde::{Serialize, Serializer};

/// One entry of the init list, executed once at startup in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitRecord {
    /// Pause for the given number of microseconds.
    Delay(u32),
    /// Switch the serial port to new parameters.
    CommsOverride(CommParams),
    /// Send one pre-encoded request.
    Frame(InitFrame),
}

/// A one-shot request of the init list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitFrame {
    pub device: String,
    pub mbid: u8,
    pub function: Function,
    pub address: u16,
    /// Coils or registers addressed on the wire.
    pub count: u16,
    /// Encoded data, one element per `<data>` value. `W_COILS` carries one
    /// byte (0 or 1) per coil; the serializer packs the bits.
    #[serde(serialize_with = "as_hex")]
    pub payload: Vec<u8>,
    /// Byte width of each element in `payload`, for listings.
    #[serde(skip)]
    pub element_sizes: Vec<usize>,
    pub timeout: u32,
    pub flags: CommandFlags,
}

/// An entry of the cyclic command list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandRecord {
    Delay(u32),
    Command(Command),
}

/// A cyclic read or write bound to HAL pins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    pub name: Option<String>,
    pub device: String,
    pub mbid: u8,
    pub function: Function,
    pub address: u16,
    /// Number of pins.
    pub count: u16,
    /// Coils or registers spanned, skips included.
    pub registers: u16,
    /// Repeat period in microseconds; `INTERVAL_ONCE` runs it once.
    pub interval: u32,
    pub timeout: u32,
    pub flags: CommandFlags,
    pub pins: Vec<Pin>,
}

/// A HAL pin bound to a value inside a command's register block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pin {
    /// `device.name`, unique over the whole document.
    pub tag: String,
    pub modbus_type: ModbusType,
    pub hal_type: HalType,
    pub flags: PinFlags,
    /// Register (or coil) offset from the command address.
    pub offset: u16,
}

/// The fully resolved document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schedule {
    pub params: CommParams,
    pub devices: DeviceRegistry,
    pub init: Vec<InitRecord>,
    pub commands: Vec<CommandRecord>,
}

impl Schedule {
    pub fn pin_count(&self) -> usize {
        self.commands
            .iter()
            .map(|c| match c {
                CommandRecord::Command(cmd) => cmd.pins.len(),
                CommandRecord::Delay(_) => 0,
            })
            .sum()
    }

    /// Human-readable report of everything that was resolved.
    pub fn listing(&self) -> Listing<'_> {
        Listing(self)
    }
}

fn as_hex<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

/// Display adapter returned by [`Schedule::listing`].
pub struct Listing<'a>(&'a Schedule);

struct Auto(u32, &'static str);

impl fmt::Display for Auto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => f.write_str("auto"),
            v => write!(f, "{} {}", v, self.1),
        }
    }
}

struct FlagList(Vec<&'static str>);

impl fmt::Display for FlagList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<none>")
        } else {
            f.write_str(&self.0.join(","))
        }
    }
}

fn parity_name(parity: Parity) -> &'static str {
    match parity {
        Parity::None => "None",
        Parity::Odd => "Odd",
        Parity::Even => "Even",
    }
}

impl Listing<'_> {
    fn comms_override(f: &mut fmt::Formatter<'_>, n: usize, p: &CommParams) -> fmt::Result {
        writeln!(
            f,
            "Init {:2}: comms baudrate={} parity={} stopbits={} rxdelay={} txdelay={} drivedelay={} icdelay={}",
            n,
            p.baudrate,
            parity_name(p.parity),
            p.stopbits,
            Auto(p.rxdelay.into(), "bits"),
            Auto(p.txdelay.into(), "bits"),
            Auto(p.drivedelay.into(), "bits"),
            Auto(p.icdelay.into(), "bits"),
        )
    }

    fn frame(f: &mut fmt::Formatter<'_>, n: usize, frame: &InitFrame) -> fmt::Result {
        write!(
            f,
            "Init {:2}: {} {}({}) addr=0x{:04x} flags={} timeout={} data=",
            n,
            frame.device,
            frame.function,
            frame.function.code(),
            frame.address,
            FlagList(frame.flags.names()),
            frame.timeout
        )?;
        let mut start = 0;
        let mut chunks: Vec<String> = Vec::with_capacity(frame.element_sizes.len());
        for &size in &frame.element_sizes {
            let Some(c) = frame.payload.get(start..start + size) else {
                break;
            };
            start += size;
            chunks.push(match (frame.function, c.first()) {
                (Function::WriteCoils, Some(bit)) => alloc::format!("{:x}", bit),
                _ => hex::encode(c),
            });
        }
        writeln!(f, "{}", chunks.join(","))
    }

    fn command(f: &mut fmt::Formatter<'_>, n: usize, cmd: &Command) -> fmt::Result {
        let interval = match cmd.interval {
            crate::types::INTERVAL_ONCE => String::from("once"),
            v => alloc::format!("{}", v),
        };
        writeln!(
            f,
            "Command {:2}: {} {}({}) addr=0x{:04x} flags={} interval={} timeout={}",
            n,
            cmd.device,
            cmd.function,
            cmd.function.code(),
            cmd.address,
            FlagList(cmd.flags.names()),
            interval,
            cmd.timeout
        )?;
        let io = if cmd.function.is_write() { "in " } else { "out" };
        for (i, pin) in cmd.pins.iter().enumerate() {
            let types = if pin.hal_type == HalType::Bit {
                String::from("HAL_BIT<=>BIT")
            } else {
                alloc::format!("{}<=>{}", pin.hal_type, pin.modbus_type)
            };
            writeln!(
                f,
                "  pin {:2} ({}): {:24} {} flags={} addr=0x{:04x}",
                i + 1,
                io,
                pin.tag,
                types,
                FlagList(pin.flags.names()),
                u32::from(cmd.address) + u32::from(pin.offset)
            )?;
            if pin.flags.contains(PinFlags::SCALE) {
                let offset_type = if cmd.function.is_write() {
                    pin.hal_type.name()
                } else {
                    match pin.modbus_type.kind() {
                        ValueKind::Unsigned => "HAL_U64",
                        ValueKind::Signed => "HAL_S64",
                        ValueKind::Float => "HAL_FLOAT",
                    }
                };
                writeln!(
                    f,
                    "         (in ): {:24} {}",
                    alloc::format!("{}.offset", pin.tag),
                    offset_type
                )?;
                writeln!(
                    f,
                    "         (in ): {:24} HAL_FLOAT",
                    alloc::format!("{}.scale", pin.tag)
                )?;
                if !cmd.function.is_write() {
                    writeln!(
                        f,
                        "         (out): {:24} HAL_FLOAT",
                        alloc::format!("{}.scaled", pin.tag)
                    )?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        let p = &s.params;
        writeln!(f, "Default communication parameters and setup:")?;
        writeln!(f, "  baudrate  : {}", p.baudrate)?;
        writeln!(f, "  parity    : {}", parity_name(p.parity))?;
        writeln!(f, "  stopbits  : {}", p.stopbits)?;
        writeln!(f, "  icdelay   : {}", Auto(p.icdelay.into(), "bits"))?;
        writeln!(f, "  rxdelay   : {}", Auto(p.rxdelay.into(), "bits"))?;
        writeln!(f, "  txdelay   : {}", Auto(p.txdelay.into(), "bits"))?;
        writeln!(f, "  drivedelay: {}", Auto(p.drivedelay.into(), "bits"))?;
        writeln!(f, "  timeout   : {}", Auto(p.timeout, "microseconds"))?;
        writeln!(f, "  suspend   : {}", p.suspend)?;

        for device in s.devices.iter().skip(1) {
            writeln!(
                f,
                "Device bus ID 0x{0:02x} ({0:3}) ==> '{1}'",
                device.address, device.name
            )?;
        }

        for (i, record) in s.init.iter().enumerate() {
            let n = i + 1;
            match record {
                InitRecord::Delay(us) => writeln!(f, "Init {:2}: delay {} microseconds", n, us)?,
                InitRecord::CommsOverride(params) if params.same_rate(p) => {
                    writeln!(f, "Init {:2}: comms set to defaults", n)?
                }
                InitRecord::CommsOverride(params) => Self::comms_override(f, n, params)?,
                InitRecord::Frame(frame) => Self::frame(f, n, frame)?,
            }
        }

        for (i, record) in s.commands.iter().enumerate() {
            let n = i + 1;
            match record {
                CommandRecord::Delay(us) => {
                    writeln!(f, "Command {:2}: delay {} microseconds", n, us)?
                }
                CommandRecord::Command(cmd) => Self::command(f, n, cmd)?,
            }
        }
        Ok(())
    }
}
