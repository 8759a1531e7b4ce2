//! Unit tests for request framing and response accumulation.

use qga_apikey::channel::codec::{encode_request, ResponseBuffer, MAX_RESPONSE_BYTES};
use qga_apikey::models::GuestCommand;
use qga_apikey::AppError;

#[test]
fn request_is_single_newline_terminated_line() {
    let line = encode_request(&GuestCommand::guest_exec_status(7)).expect("encodes");

    assert_eq!(line.last(), Some(&b'\n'));
    assert_eq!(line.iter().filter(|b| **b == b'\n').count(), 1);
    assert_eq!(
        std::str::from_utf8(&line).expect("utf8"),
        "{\"execute\":\"guest-exec-status\",\"arguments\":{\"pid\":7}}\n"
    );
}

#[test]
fn buffer_completes_on_chunk_with_newline() {
    let mut buffer = ResponseBuffer::new();

    assert!(!buffer.push(b"{\"return\":").expect("push"));
    assert!(!buffer.is_complete());
    assert!(buffer.push(b" {}}\n").expect("push"));
    assert!(buffer.is_complete());
    assert_eq!(buffer.into_text().expect("utf8"), "{\"return\": {}}\n");
}

#[test]
fn partial_line_is_returned_as_is() {
    let mut buffer = ResponseBuffer::new();
    buffer.push(b"{\"return\"").expect("push");

    assert!(!buffer.is_complete());
    assert_eq!(buffer.into_text().expect("utf8"), "{\"return\"");
}

#[test]
fn empty_buffer_decodes_to_empty_text() {
    let buffer = ResponseBuffer::new();
    assert!(buffer.is_empty());
    assert_eq!(buffer.into_text().expect("utf8"), "");
}

#[test]
fn non_utf8_bytes_are_protocol_error() {
    let mut buffer = ResponseBuffer::new();
    buffer.push(&[0xc3, 0x28, b'\n']).expect("push");

    assert!(matches!(buffer.into_text(), Err(AppError::Protocol(_))));
}

#[test]
fn oversized_reply_is_rejected() {
    let mut buffer = ResponseBuffer::new();
    let chunk = vec![b'a'; 1024 * 1024];
    for _ in 0..(MAX_RESPONSE_BYTES / chunk.len()) {
        buffer.push(&chunk).expect("within limit");
    }

    let result = buffer.push(b"b");
    assert!(matches!(result, Err(AppError::Protocol(msg)) if msg.contains("too long")));
}
