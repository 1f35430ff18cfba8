//! String array encoding.
//!
//! Literals are moved into one array, each RC4-encrypted with its own key
//! and base64-encoded. Use sites become calls to an injected decoder that
//! reverses both steps at runtime and caches the result per index.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::random::{random_hex_name, random_identifier};

const KEY_LEN: usize = 4;

#[derive(Debug)]
struct Entry {
    index: usize,
    key: String,
}

/// Collects encoded literals and renders the decoder runtime.
#[derive(Debug)]
pub struct StringArray {
    array_fn: String,
    decoder_fn: String,
    encoded: Vec<String>,
    entries: HashMap<String, Entry>,
}

impl StringArray {
    /// `taken` lists names the runtime must not collide with.
    pub fn new(mut is_taken: impl FnMut(&str) -> bool) -> Self {
        let array_fn = fresh_name(&mut is_taken, None);
        let decoder_fn = fresh_name(&mut is_taken, Some(&array_fn));
        Self {
            array_fn,
            decoder_fn,
            encoded: Vec::new(),
            entries: HashMap::new(),
        }
    }

    pub fn decoder_name(&self) -> &str {
        &self.decoder_fn
    }

    /// A decoder call expression yielding `value`. Equal values share one slot.
    pub fn call_for(&mut self, value: &str) -> String {
        let entry = match self.entries.get(value) {
            Some(entry) => entry,
            None => {
                let key = random_identifier(KEY_LEN);
                let index = self.encoded.len();
                self.encoded.push(encode(value, &key));
                self.entries
                    .entry(value.to_string())
                    .or_insert(Entry { index, key })
            }
        };
        format!("{}(0x{:x},'{}')", self.decoder_fn, entry.index, entry.key)
    }

    pub fn len(&self) -> usize {
        self.encoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }

    /// The array function and the decoder, as two function declarations.
    pub fn runtime(&self) -> String {
        let items = self
            .encoded
            .iter()
            .map(|s| format!("'{s}'"))
            .collect::<Vec<_>>()
            .join(",");
        let a = &self.array_fn;
        let d = &self.decoder_fn;

        format!(
            "function {a}(){{var a=[{items}];{a}=function(){{return a}};return {a}()}}\
function {d}(i,k){{var c={d}.c||({d}.c={{}});if(i in c)return c[i];\
var s=atob({a}()[i]),b=[],j=0,t,o='',n,y;\
for(n=0;n<256;n++)b[n]=n;\
for(n=0;n<256;n++){{j=(j+b[n]+k.charCodeAt(n%k.length))%256;t=b[n];b[n]=b[j];b[j]=t}}\
n=0;j=0;\
for(y=0;y<s.length;y++){{n=(n+1)%256;j=(j+b[n])%256;t=b[n];b[n]=b[j];b[j]=t;\
o+='%'+('00'+(s.charCodeAt(y)^b[(b[n]+b[j])%256]).toString(16)).slice(-2)}}\
return c[i]=decodeURIComponent(o)}}"
        )
    }
}

fn fresh_name(is_taken: &mut impl FnMut(&str) -> bool, avoid: Option<&str>) -> String {
    loop {
        let name = random_hex_name("_0x", 6);
        if Some(name.as_str()) != avoid && !is_taken(&name) {
            return name;
        }
    }
}

/// RC4 keystream XOR. Symmetric: applying it twice with one key is identity.
pub fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut s: [u8; 256] = std::array::from_fn(|i| i as u8);
    if !key.is_empty() {
        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }
    }

    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(s[i as usize]);
            s.swap(i as usize, j as usize);
            let k = s[s[i as usize].wrapping_add(s[j as usize]) as usize];
            byte ^ k
        })
        .collect()
}

/// UTF-8 bytes → RC4 → base64.
pub fn encode(value: &str, key: &str) -> String {
    STANDARD.encode(rc4(key.as_bytes(), value.as_bytes()))
}

/// Inverse of [`encode`].
pub fn decode(encoded: &str, key: &str) -> Option<String> {
    let bytes = STANDARD.decode(encoded).ok()?;
    String::from_utf8(rc4(key.as_bytes(), &bytes)).ok()
}
