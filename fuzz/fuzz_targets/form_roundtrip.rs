#![no_main]
use std::collections::HashMap;

use form_pack::{marshal, unmarshal, Duration, FormMap};
use libfuzzer_sys::fuzz_target;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Fuzzed {
    #[serde(rename = "stringParam,omitempty")]
    string_param: String,
    #[serde(rename = "stringPtrParam,omitempty")]
    string_ptr_param: Option<String>,
    #[serde(rename = "int_param,omitempty")]
    int_param: i64,
    #[serde(rename = "int_ptr_param,omitempty")]
    int_ptr_param: Option<i32>,
    #[serde(rename = "uint_param,omitempty")]
    uint_param: u64,
    #[serde(rename = "float32_param,omitempty")]
    float32_param: f32,
    #[serde(rename = "float64_ptr_param,omitempty")]
    float64_ptr_param: Option<f64>,
    #[serde(rename = "bool_param,omitempty")]
    bool_param: bool,
    #[serde(rename = "durationParam,omitempty")]
    duration_param: Duration,
    #[serde(rename = "slice_param,omitempty")]
    slice_param: Vec<String>,
    #[serde(rename = "slice_int_ptr_param,omitempty")]
    slice_int_ptr_param: Vec<Option<i16>>,
    #[serde(rename = "map_string_slice,omitempty")]
    map_string_slice: HashMap<String, Vec<String>>,
    #[serde(rename = "map_string_int,omitempty")]
    map_string_int: HashMap<String, u8>,
}

impl Fuzzed {
    fn has_nan(&self) -> bool {
        self.float32_param.is_nan() || self.float64_ptr_param.map_or(false, f64::is_nan)
    }
}

/// Split `a=b&c=d` into a form map. No percent-decoding: the codec never sees escapes.
fn parse_query(query: &str) -> FormMap {
    let mut form = FormMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        form.entry(key.to_string()).or_default().push(value.to_string());
    }
    form
}

fuzz_target!(|data: &[u8]| {
    let Ok(query) = std::str::from_utf8(data) else {
        return;
    };
    let form = parse_query(query);
    let Ok(record) = unmarshal::<Fuzzed>(&form) else {
        return;
    };
    if record.has_nan() {
        return;
    }
    let encoded = marshal(&record).expect("a decoded record always encodes");
    let again: Fuzzed = unmarshal(&encoded).expect("an encoded record always decodes");
    assert_eq!(record, again);
});
