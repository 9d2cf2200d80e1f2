//! Integration tests compiling element trees built in code.
//!
//! Each test builds a `<mesamodbus>` document with the `Element` builder and
//! checks the resolved schedule, the diagnostics and the image.

use mbccb_rs::{
    CommandRecord, Element, Function, InitRecord, MbccbError, ModbusType, Schedule, compile,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn device(name: &str, address: &str) -> Element {
    Element::new("device")
        .with_attr("name", name)
        .with_attr("address", address)
}

fn document(devices: Vec<Element>, sections: Vec<Element>) -> Element {
    let mut devs = Element::new("devices");
    devs.children = devices;
    let mut root = Element::new("mesamodbus").with_child(devs);
    root.children.extend(sections);
    root
}

fn commands(children: Vec<Element>) -> Element {
    let mut section = Element::new("commands");
    section.children = children;
    section
}

fn only_command(schedule: &Schedule) -> &mbccb_rs::Command {
    match &schedule.commands[..] {
        [CommandRecord::Command(cmd)] => cmd,
        other => panic!("Expected a single command, got {:?}", other),
    }
}

fn rejection(root: &Element) -> Vec<(String, String)> {
    match compile(root) {
        Err(MbccbError::Rejected(diags)) => diags
            .errors()
            .map(|d| (d.path.clone(), d.message.clone()))
            .collect(),
        Err(other) => panic!("Expected a rejection, got {}", other),
        Ok(_) => panic!("Expected a rejection, document compiled"),
    }
}

#[test]
fn test_generated_pin_names() {
    init_logger();
    let root = document(
        vec![device("drive", "5")],
        vec![commands(vec![
            Element::new("command")
                .with_attr("device", "drive")
                .with_attr("function", "R_REGISTERS")
                .with_attr("address", "0x10")
                .with_attr("count", "2")
                .with_attr("name", "temp")
                .with_attr("modbustype", "S_AB")
                .with_attr("haltype", "HAL_S32"),
        ])],
    );
    let compiled = compile(&root).expect("Should compile");
    let cmd = only_command(&compiled.schedule);
    let tags: Vec<(&str, u16)> = cmd.pins.iter().map(|p| (p.tag.as_str(), p.offset)).collect();
    assert_eq!(tags, [("drive.temp-00", 0), ("drive.temp-01", 1)]);
    assert_eq!(cmd.mbid, 5);
    assert_eq!(cmd.address, 0x10);
    assert_eq!(compiled.image.command_record(0).unwrap().reg_count, 2);
}

#[test]
fn test_half_float_init_data() {
    let root = document(
        vec![device("drive", "5")],
        vec![
            Element::new("initlist").with_child(
                Element::new("command")
                    .with_attr("device", "drive")
                    .with_attr("function", "W_REGISTER")
                    .with_attr("address", "0x300")
                    .with_child(
                        Element::new("data")
                            .with_attr("value", "1.5")
                            .with_attr("modbustype", "F_AB"),
                    ),
            ),
        ],
    );
    let compiled = compile(&root).expect("Should compile");
    match &compiled.schedule.init[..] {
        [InitRecord::Frame(frame)] => {
            assert_eq!(frame.payload, [0x3e, 0x00]);
            assert_eq!(frame.count, 1);
        }
        other => panic!("Expected one init frame, got {:?}", other),
    }
}

#[test]
fn test_duplicate_address_keeps_first() {
    let root = document(vec![device("left", "7"), device("right", "7")], vec![]);
    let errors = rejection(&root);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "devices/device[2]");
}

#[test]
fn test_skip_inside_block() {
    let root = document(
        vec![device("drive", "5")],
        vec![commands(vec![
            Element::new("command")
                .with_attr("device", "drive")
                .with_attr("function", "R_REGISTERS")
                .with_attr("address", "0")
                .with_attr("count", "5")
                .with_attr("name", "blk")
                .with_attr("modbustype", "U_AB")
                .with_attr("haltype", "U32")
                .with_child(Element::new("pin").with_attr("name", "head"))
                .with_child(Element::new("pin").with_attr("skip", "3")),
        ])],
    );
    let compiled = compile(&root).expect("Should compile");
    let cmd = only_command(&compiled.schedule);
    let offsets: Vec<u16> = cmd.pins.iter().map(|p| p.offset).collect();
    assert_eq!(offsets, [0, 4, 5, 6, 7]);
    assert_eq!(cmd.registers, 8);
    assert_eq!(cmd.count, 5);
}

#[test]
fn test_later_commands_still_checked() {
    let cmd = |device: Option<&str>, name: &str| {
        let el = Element::new("command")
            .with_attr("function", "R_COILS")
            .with_attr("address", "0")
            .with_attr("count", "1")
            .with_attr("name", name);
        match device {
            Some(d) => el.with_attr("device", d),
            None => el,
        }
    };
    let root = document(
        vec![device("drive", "5")],
        vec![commands(vec![
            cmd(None, "first"),
            cmd(Some("drive"), "second"),
            cmd(Some("drive"), "second"),
        ])],
    );
    let errors = rejection(&root);
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].0, "commands/command[1]");
    assert!(errors[0].1.contains("'device'"));
    assert_eq!(errors[1].0, "commands/command[3]");
    assert!(errors[1].1.contains("drive.second-00"));
}

#[test]
fn test_register_block_limits() {
    let wide = Element::new("command")
        .with_attr("device", "drive")
        .with_attr("function", "R_INPUTREGS")
        .with_attr("address", "0xfff0")
        .with_attr("count", "5")
        .with_attr("name", "big")
        .with_attr("modbustype", ModbusType::U_AB.to_string())
        .with_attr("haltype", "HAL_U32")
        .with_child(
            Element::new("pin")
                .with_attr("name", "wide")
                .with_attr("modbustype", "U_ABCDEFGH")
                .with_attr("haltype", "HAL_U64"),
        );
    // 4 + 4 registers from 0xfff0 fits; 0xfff9 would not.
    let root = document(vec![device("drive", "5")], vec![commands(vec![wide.clone()])]);
    let compiled = compile(&root).expect("Should compile");
    assert_eq!(only_command(&compiled.schedule).registers, 8);

    let mut shifted = wide;
    shifted.attributes[2].1 = "0xfff9".to_string();
    let root = document(vec![device("drive", "5")], vec![commands(vec![shifted])]);
    let errors = rejection(&root);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].1.contains("wraps"));
}

#[test]
fn test_function_codes_accepted() {
    let root = document(
        vec![device("drive", "5")],
        vec![commands(vec![
            Element::new("command")
                .with_attr("device", "drive")
                .with_attr("function", "0x0f")
                .with_attr("address", "0")
                .with_attr("count", "3")
                .with_attr("name", "outs"),
        ])],
    );
    let compiled = compile(&root).expect("Should compile");
    assert_eq!(only_command(&compiled.schedule).function, Function::WriteCoils);
}

#[test]
fn test_schedule_json_shape() {
    let root = document(
        vec![device("drive", "5")],
        vec![
            Element::new("initlist")
                .with_child(Element::new("command").with_attr("delay", "1000")),
            commands(vec![
                Element::new("command")
                    .with_attr("device", "drive")
                    .with_attr("function", "R_REGISTERS")
                    .with_attr("address", "0")
                    .with_attr("modbustype", "F_ABCD")
                    .with_attr("haltype", "HAL_FLOAT")
                    .with_child(Element::new("pin").with_attr("name", "speed")),
            ]),
        ],
    );
    let compiled = compile(&root).expect("Should compile");
    let json = serde_json::to_value(&compiled.schedule).unwrap();
    assert_eq!(json["params"]["baudrate"], 9600);
    assert_eq!(json["init"][0]["delay"], 1000);
    let pin = &json["commands"][0]["command"]["pins"][0];
    assert_eq!(pin["tag"], "drive.speed");
    assert_eq!(pin["modbus_type"], "F_ABCD");
    assert_eq!(json["commands"][0]["command"]["function"], "R_REGISTERS");
}
