#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use storesync_runtime::component::{Component, ComponentClass, Element};
use storesync_runtime::reactive::{BindingState, InitialState};
use storesync_runtime::sync::create_store_sync;

const FIELDS: [&str; 3] = ["user", "data", "theme"];

#[derive(Default)]
struct Fields([Option<u8>; 3]);

impl Component for Fields {
    type Value = u8;

    fn field(&self, name: &str) -> Option<u8> {
        FIELDS.iter().position(|f| *f == name).and_then(|i| self.0[i])
    }

    fn set_field(&mut self, name: &str, value: Option<u8>) {
        if let Some(i) = FIELDS.iter().position(|f| *f == name) {
            self.0[i] = value;
        }
    }
}

#[derive(Debug, Arbitrary)]
enum Op {
    Connect(u8),
    Disconnect(u8),
    Drop(u8),
    LocalSet(u8, u8, Option<u8>),
    Write(u8, u8),
    Clear(u8),
    Reset,
}

fuzz_target!(|ops: Vec<Op>| {
    let sync = create_store_sync(InitialState::new().with("user", 1u8).declare("data"));
    let class = ComponentClass::<Fields>::new("fields").build();
    for field in FIELDS {
        let _ = sync.declarator().attach(&class, field);
    }
    let mut elements: Vec<Option<Element<Fields>>> = (0..4)
        .map(|_| Some(Element::new(&class, Fields::default())))
        .collect();

    for op in ops.iter().take(256) {
        match *op {
            Op::Connect(e) => {
                if let Some(el) = &elements[e as usize % 4] {
                    el.connect();
                }
            }
            Op::Disconnect(e) => {
                if let Some(el) = &elements[e as usize % 4] {
                    el.disconnect();
                }
            }
            Op::Drop(e) => elements[e as usize % 4] = None,
            Op::LocalSet(e, f, v) => {
                if let Some(el) = &elements[e as usize % 4] {
                    el.set(FIELDS[f as usize % 3], v);
                }
            }
            Op::Write(f, v) => {
                sync.store().write(FIELDS[f as usize % 3], v);
            }
            Op::Clear(f) => {
                sync.store().clear(FIELDS[f as usize % 3]);
            }
            Op::Reset => {
                sync.store().reset();
            }
        }

        // Exactly one listener per store-driven binding.
        for field in FIELDS {
            let driven = elements
                .iter()
                .flatten()
                .filter(|el| el.binding_state(field) == BindingState::StoreDriven)
                .count();
            assert_eq!(sync.registry().listener_count(field), driven);
        }
    }
});
