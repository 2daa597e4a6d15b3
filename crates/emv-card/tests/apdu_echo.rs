//! A link that echoes each command back with a scripted status word must
//! hand that status and the echoed bytes back through `Session::send`

use emv_card::apdu::{commands, ApduCommand};
use emv_card::{aids, MockLink, Session};
use proptest::prelude::*;

fn command() -> impl Strategy<Value = ApduCommand> {
    (
        any::<[u8; 4]>(),
        prop::collection::vec(any::<u8>(), 0..=300),
        prop::option::of(0u16..=1024),
    )
        .prop_map(|([cla, ins, p1, p2], data, le)| {
            let command = ApduCommand::new(cla, ins, p1, p2).data(data).unwrap();
            match le {
                Some(le) => command.le(le),
                None => command,
            }
        })
}

/// Any status word except the 61XX / 6CXX procedure bytes
fn status_word() -> impl Strategy<Value = (u8, u8)> {
    (any::<u8>(), any::<u8>()).prop_filter("procedure byte", |(sw1, _)| *sw1 != 0x61 && *sw1 != 0x6C)
}

fn echo_session(command: &ApduCommand, (sw1, sw2): (u8, u8)) -> Session<MockLink> {
    let encoded = command.encode();
    let mut echo = encoded.clone();
    echo.extend([sw1, sw2]);
    let mut session = Session::new(MockLink::new().respond(encoded, echo));
    session.connect().unwrap();
    session
}

proptest! {
    #[test]
    fn echoed_command_keeps_scripted_status(command in command(), (sw1, sw2) in status_word()) {
        let mut session = echo_session(&command, (sw1, sw2));

        let response = session.send(&command).unwrap();

        prop_assert_eq!(response.sw1, sw1);
        prop_assert_eq!(response.sw2, sw2);
        prop_assert_eq!(response.data, command.encode());
    }

    #[test]
    fn long_commands_use_the_extended_form(command in command()) {
        let encoded = command.encode();
        let extended = command.command_data().len() > 255
            || command.expected_length().map_or(false, |le| le > 256);

        prop_assert_eq!(&encoded[..4], &[command.cla(), command.ins(), command.p1(), command.p2()][..]);
        if extended {
            prop_assert_eq!(encoded[4], 0x00);
        }
        let header = if extended { 5 } else { 4 };
        let lc = if command.command_data().is_empty() { 0 } else if extended { 2 } else { 1 };
        let le = match command.expected_length() {
            None => 0,
            Some(_) if extended => 2,
            Some(_) => 1,
        };
        prop_assert_eq!(encoded.len(), header + lc + command.command_data().len() + le);
    }
}

#[test]
fn echoed_select_keeps_warning_status() {
    let command = commands::select(aids::VISA).unwrap();
    let mut session = echo_session(&command, (0x62, 0x83));

    let response = session.send(&command).unwrap();

    assert_eq!(response.status_word(), 0x6283);
    assert_eq!(response.data, command.encode());
}
