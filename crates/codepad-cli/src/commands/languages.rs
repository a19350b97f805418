use codepad_runtime::language::{self, LOCAL_TAG};

pub fn execute() {
    println!("Languages:");
    for descriptor in language::all() {
        let mode = if descriptor.tag == LOCAL_TAG {
            "local"
        } else {
            "remote"
        };
        println!(
            "  - {:<11} id {:>3}  {:<6}  {}",
            descriptor.tag, descriptor.remote_id, mode, descriptor.display_name
        );
    }
}
