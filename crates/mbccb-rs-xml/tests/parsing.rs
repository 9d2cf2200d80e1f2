//! Integration tests compiling complete documents from XML text.
//!
//! These tests exercise the whole path: quick-xml parsing into an element
//! tree, resolution of defaults, devices, init list and commands, and the
//! binary layout of the resulting image.

use mbccb_rs::{
    Codec, CommandRecord, Function, HEADER_SIZE, HalType, Header, InitRecord, ModbusType,
    PinFlags, RECORD_SIZE, Record, estimate_timeout,
};
use mbccb_rs_xml::{compile_str, parse_document};

const RIG_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mesamodbus baudrate="19200" parity="N" interval="100000">
  <description>Test rig with a drive and an I/O block</description>
  <devices>
    <device name="drive" address="5"/>
    <device name="io" address="0x10"/>
  </devices>
  <initlist>
    <command device="drive" function="W_REGISTER" address="0x2000">
      <data value="1.5" modbustype="F_AB"/>
    </command>
    <command delay="50000"/>
  </initlist>
  <commands>
    <!-- Two generated pins -->
    <command device="drive" function="R_REGISTERS" address="0x10" count="2"
             name="speed" modbustype="U_AB" haltype="HAL_U32"/>
    <command device="io" function="W_COILS" address="0">
      <pin name="out0"/>
      <pin name="out1"/>
    </command>
    <command delay="1000"/>
  </commands>
</mesamodbus>
"#;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_parse_tree_shape() {
    let root = parse_document(RIG_XML).expect("Should parse");
    assert_eq!(root.tag, "mesamodbus");
    let tags: Vec<&str> = root.children.iter().map(|c| c.tag.as_str()).collect();
    assert_eq!(tags, ["description", "devices", "initlist", "commands"]);
}

#[test]
fn test_compile_rig_schedule() {
    init_logger();
    let compiled = compile_str(RIG_XML).expect("Should compile");
    assert!(compiled.diagnostics.is_empty());

    let schedule = &compiled.schedule;
    assert_eq!(schedule.params.baudrate, 19200);
    assert_eq!(schedule.params.interval, 100_000);
    assert_eq!(schedule.devices.address_of("io"), Some(0x10));

    let InitRecord::Frame(frame) = &schedule.init[0] else {
        panic!("Expected an init frame, got {:?}", schedule.init[0]);
    };
    assert_eq!(frame.function, Function::WriteRegister);
    assert_eq!(frame.payload, [0x3e, 0x00]);
    assert!(matches!(schedule.init[1], InitRecord::Delay(50_000)));

    let CommandRecord::Command(speed) = &schedule.commands[0] else {
        panic!("Expected a command");
    };
    let tags: Vec<(&str, u16)> = speed.pins.iter().map(|p| (p.tag.as_str(), p.offset)).collect();
    assert_eq!(tags, [("drive.speed-00", 0), ("drive.speed-01", 1)]);
    assert_eq!(speed.interval, 100_000);
    assert!(matches!(schedule.commands[2], CommandRecord::Delay(1000)));
    assert_eq!(schedule.pin_count(), 4);
}

#[test]
fn test_compile_rig_image() {
    init_logger();
    let compiled = compile_str(RIG_XML).expect("Should compile");
    let image = &compiled.image;
    let bytes = image.as_bytes();

    assert_eq!(&bytes[..8], b"MesaMB01");
    let header = Header::deserialize(bytes).expect("Header should decode");
    assert_eq!(header.baudrate, 19200);
    assert_eq!(header.init_len as usize, 2 * RECORD_SIZE);
    assert_eq!(header.cmds_len as usize, 3 * RECORD_SIZE);
    assert_eq!(
        bytes.len(),
        HEADER_SIZE + 5 * RECORD_SIZE + header.data_len as usize
    );
    assert_eq!(image.init_records(), 2);
    assert_eq!(image.command_records(), 3);
    assert_eq!(image.pin_count(), 4);

    // The init frame points at its pre-built request packet.
    let data = image.data();
    assert_eq!(data[0], 0);
    let init = image.init_record(0).unwrap();
    assert_eq!(init.mbid, 5);
    assert_eq!(init.function, 6);
    let ptr = init.data_ptr as usize;
    assert_eq!(&data[ptr..ptr + 7], [6, 5, 6, 0x20, 0x00, 0x3e, 0x00]);

    let delay = image.init_record(1).unwrap();
    assert!(delay.is_meta());
    assert_eq!(delay.address, Record::META_DELAY);
    assert_eq!(delay.timeout, 50_000);

    // Register command: names then an aligned type table.
    let speed = image.command_record(0).unwrap();
    assert_eq!(speed.mbid, 5);
    assert_eq!(speed.function, 3);
    assert_eq!(speed.address, 0x10);
    assert_eq!(speed.pin_count, 2);
    assert_eq!(speed.reg_count, 2);
    let name = speed.data_ptr as usize;
    assert_eq!(data[name] as usize, "drive.speed-00".len() + 1);
    assert_eq!(&data[name + 1..name + 15], b"drive.speed-00");
    assert_eq!(data[name + 15], 0);
    let types = speed.type_ptr as usize;
    assert_eq!((types + 1) % 4, 0);
    assert_eq!(data[types], 8);
    assert_eq!(
        &data[types + 1..types + 9],
        [
            ModbusType::U_AB.code(),
            HalType::U32.code(),
            PinFlags::CLAMP.bits(),
            0,
            ModbusType::U_AB.code(),
            HalType::U32.code(),
            PinFlags::CLAMP.bits(),
            1
        ]
    );

    // Coil command: no type table.
    let coils = image.command_record(1).unwrap();
    assert_eq!(coils.mbid, 0x10);
    assert_eq!(coils.function, 15);
    assert_eq!(coils.type_ptr, 0);
    assert_eq!(coils.reg_count, 2);

    let pause = image.command_record(2).unwrap();
    assert!(pause.is_meta());
    assert_eq!(pause.timeout, 1000);
    assert!(image.command_record(3).is_none());
}

#[test]
fn test_listing_mentions_everything() {
    let compiled = compile_str(RIG_XML).expect("Should compile");
    let listing = compiled.schedule.listing().to_string();
    assert!(listing.contains("baudrate  : 19200"));
    assert!(listing.contains("==> 'drive'"));
    assert!(listing.contains("==> 'io'"));
    assert!(listing.contains("Init  2: delay 50000 microseconds"));
    assert!(listing.contains("drive.speed-01"));
    assert!(listing.contains("io.out1"));
}

#[test]
fn test_warnings_do_not_block_output() {
    let xml = r#"<mesamodbus colour="blue">
      <devices><device name="plc" address="250"/></devices>
      <commands>
        <command device="plc" function="R_INPUTS" address="0" count="4" name="in"
                 haltype="HAL_S32"/>
      </commands>
    </mesamodbus>"#;
    let compiled = compile_str(xml).expect("Warnings only");
    // Unknown root attribute, reserved address, haltype on a bit function.
    assert_eq!(compiled.diagnostics.warning_count(), 3);
    assert!(!compiled.diagnostics.has_errors());
    assert_eq!(compiled.image.pin_count(), 4);
}

#[test]
fn test_comms_override_restored() {
    let xml = r#"<mesamodbus>
      <devices><device name="drive" address="1"/></devices>
      <initlist>
        <command baudrate="115200" parity="O"/>
        <command device="drive" function="W_COIL" address="3">
          <data value="0xff00"/>
        </command>
      </initlist>
    </mesamodbus>"#;
    let compiled = compile_str(xml).expect("Should compile");
    assert_eq!(compiled.diagnostics.warning_count(), 1);
    let init = &compiled.schedule.init;
    assert_eq!(init.len(), 3);
    assert!(matches!(&init[2], InitRecord::CommsOverride(p) if p.baudrate == 9600));

    let image = &compiled.image;
    let first = image.init_record(0).unwrap();
    assert_eq!(first.address, Record::META_COMMS);
    assert_eq!(first.timeout, 115_200);
    let restore = image.init_record(2).unwrap();
    assert_eq!(restore.timeout, 9600);
}

const INHERIT_XML: &str = r#"<mesamodbus timeout="50000" interval="200000">
  <devices><device name="meter" address="7"/></devices>
  <initlist>
    <command device="meter" function="R_REGISTERS" address="0" count="2"/>
    <command device="meter" function="W_REGISTERS" address="0x40">
      <data value="1"/>
      <data value="2" modbustype="U_ABCD"/>
    </command>
  </initlist>
  <commands>
    <command device="meter" function="R_REGISTERS" address="0x10" count="1"
             name="volts" modbustype="U_AB" haltype="HAL_U32"/>
  </commands>
</mesamodbus>"#;

#[test]
fn test_root_defaults_inherited() {
    init_logger();
    let compiled = compile_str(INHERIT_XML).expect("Should compile");
    let schedule = &compiled.schedule;
    assert_eq!(schedule.params.timeout, 50_000);

    let InitRecord::Frame(read) = &schedule.init[0] else {
        panic!("Expected an init frame, got {:?}", schedule.init[0]);
    };
    assert_eq!(read.timeout, 50_000);
    let CommandRecord::Command(volts) = &schedule.commands[0] else {
        panic!("Expected a command");
    };
    assert_eq!(volts.timeout, 50_000);
    assert_eq!(volts.interval, 200_000);
    assert_eq!(compiled.image.command_record(0).unwrap().timeout, 50_000);
}

#[test]
fn test_timeout_estimated_without_root_default() {
    let xml = INHERIT_XML.replace(r#"timeout="50000" "#, "");
    let compiled = compile_str(&xml).expect("Should compile");
    let schedule = &compiled.schedule;
    assert_eq!(schedule.params.timeout, 0);

    let CommandRecord::Command(volts) = &schedule.commands[0] else {
        panic!("Expected a command");
    };
    let estimate = estimate_timeout(Function::ReadRegisters, 1, ModbusType::U_AB, &schedule.params);
    assert_eq!(volts.timeout, estimate);
    let InitRecord::Frame(read) = &schedule.init[0] else {
        panic!("Expected an init frame");
    };
    let estimate = estimate_timeout(Function::ReadRegisters, 2, ModbusType::U_AB, &schedule.params);
    assert_eq!(read.timeout, estimate);
}

#[test]
fn test_listing_splits_mixed_width_data() {
    let compiled = compile_str(INHERIT_XML).expect("Should compile");
    let listing = compiled.schedule.listing().to_string();
    assert!(listing.contains("data=0001,00000002"), "{}", listing);
}
