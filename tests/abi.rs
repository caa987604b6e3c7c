//! ABI Codec Integration Tests
//!
//! Encodes calls against a contract whose functions return their inputs and
//! checks what the decoded results look like to later jobs.

use chainpm::abi::{Abi, AbiError};
use chainpm::domain::Value;

const MIRROR_ABI: &str = r#"[
    {"type":"function","name":"mixed",
     "inputs":[{"name":"who","type":"address"},{"name":"tags","type":"uint256[]"},
               {"name":"note","type":"string"},{"name":"delta","type":"int64"}],
     "outputs":[{"name":"who","type":"address"},{"name":"tags","type":"uint256[]"},
                {"name":"note","type":"string"},{"name":"delta","type":"int64"}]},
    {"type":"function","name":"label","inputs":[{"name":"","type":"bytes32"}],
     "outputs":[{"name":"","type":"bytes32"}]},
    {"type":"function","name":"triple","inputs":[{"name":"xs","type":"uint8[3]"}],
     "outputs":[{"name":"xs","type":"uint8[3]"}]},
    {"type":"function","name":"widths",
     "inputs":[{"name":"a","type":"uint8"},{"name":"b","type":"uint16"},{"name":"c","type":"uint32"},
               {"name":"d","type":"uint64"},{"name":"e","type":"uint256"},{"name":"f","type":"int16"},
               {"name":"g","type":"int32"},{"name":"h","type":"int256"},{"name":"i","type":"bool"},
               {"name":"j","type":"bytes"},{"name":"k","type":"bool[]"}],
     "outputs":[{"name":"a","type":"uint8"},{"name":"b","type":"uint16"},{"name":"c","type":"uint32"},
               {"name":"d","type":"uint64"},{"name":"e","type":"uint256"},{"name":"f","type":"int16"},
               {"name":"g","type":"int32"},{"name":"h","type":"int256"},{"name":"i","type":"bool"},
               {"name":"j","type":"bytes"},{"name":"k","type":"bool[]"}]},
    {"type":"function","name":"small","inputs":[{"name":"x","type":"int8"}],"outputs":[]}
]"#;

fn mirror(abi: &Abi, function: &str, args: &[&str]) -> chainpm::JobResults {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let data = abi.encode_call(function, &args).unwrap();
    abi.decode_return(function, &data[4..]).unwrap()
}

#[test]
fn test_mixed_static_and_dynamic_outputs() {
    let abi = Abi::from_json(MIRROR_ABI).unwrap();
    let results = mirror(&abi, "mixed", &["0xabcd", "[1, 2, 3]", "hello, world", "-42"]);

    let who = "000000000000000000000000000000000000ABCD";
    assert_eq!(results.named_results["who"].string_result, who);
    assert_eq!(results.named_results["tags"].string_result, "[1,2,3]");
    assert_eq!(
        results.named_results["tags"].actual_result,
        Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
    assert_eq!(results.named_results["note"].string_result, "hello, world");
    assert_eq!(results.named_results["delta"].actual_result, Value::Int(-42));
    assert_eq!(
        results.full_result.string_result,
        format!("({}, [1,2,3], hello, world, -42)", who)
    );
}

#[test]
fn test_integer_widths_echo_back() {
    let abi = Abi::from_json(MIRROR_ABI).unwrap();
    let args = [
        "255",
        "65535",
        "4294967295",
        "18446744073709551615",
        "115792089237316195423570985008687907853269984665640564039457584007913129639935",
        "-32768",
        "-2147483648",
        "-1",
        "true",
        "payload",
        "[true,false]",
    ];
    let results = mirror(&abi, "widths", &args);

    for (name, expected) in ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k"]
        .iter()
        .zip(args)
    {
        assert_eq!(results.named_results[*name].string_result, expected);
    }
    // Too wide for an i64, so kept as text
    assert_eq!(
        results.named_results["d"].actual_result,
        Value::Str("18446744073709551615".to_string())
    );
    assert_eq!(results.named_results["h"].actual_result, Value::Int(-1));
}

#[test]
fn test_fixed_bytes_render_as_text() {
    let abi = Abi::from_json(MIRROR_ABI).unwrap();
    let results = mirror(&abi, "label", &["storage"]);
    assert_eq!(results.full_result.string_result, "storage");
    assert_eq!(results.named_results["0"].string_result, "storage");

    let hex_input = mirror(&abi, "label", &["0x0102"]);
    assert_eq!(hex_input.full_result.string_result, "0x0102");
}

#[test]
fn test_fixed_array_length_is_checked() {
    let abi = Abi::from_json(MIRROR_ABI).unwrap();
    assert_eq!(
        mirror(&abi, "triple", &["[7,8,9]"]).full_result.string_result,
        "[7,8,9]"
    );

    let err = abi
        .encode_call("triple", &["[1,2]".to_string()])
        .unwrap_err();
    assert_eq!(err, AbiError::ArrayLength { expected: 3, got: 2 });
}

#[test]
fn test_out_of_range_and_argument_count() {
    let abi = Abi::from_json(MIRROR_ABI).unwrap();

    assert!(abi.encode_call("small", &["-128".to_string()]).is_ok());
    assert!(matches!(
        abi.encode_call("small", &["128".to_string()]),
        Err(AbiError::InvalidValue { .. })
    ));
    assert!(matches!(
        abi.encode_call("small", &[]),
        Err(AbiError::ArgumentCount { expected: 1, got: 0, .. })
    ));
}

#[test]
fn test_empty_function_without_fallback() {
    let abi = Abi::from_json(MIRROR_ABI).unwrap();
    assert_eq!(
        abi.encode_call("", &[]).unwrap_err(),
        AbiError::UnknownFunction("(fallback)".to_string())
    );
}
