// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;

#[test]
fn router_and_openapi_document_list_the_same_paths() {
    let router_src = std::fs::read_to_string(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("src/lib.rs"),
    )
    .expect("read router source");

    let param_re = regex::Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("param regex");
    let route_re = regex::Regex::new(r#"\.route\(\s*"([^"]+)""#).expect("route regex");
    let routes: BTreeSet<String> = route_re
        .captures_iter(&router_src)
        .map(|cap| param_re.replace_all(&cap[1], "{$1}").to_string())
        .collect();

    let spec = medallion_api::openapi_v1_spec();
    let documented: BTreeSet<String> = spec["paths"]
        .as_object()
        .expect("paths object")
        .keys()
        .cloned()
        .collect();

    assert_eq!(routes, documented, "route registry drift");
}
