use soultrace_dom_model::{DomDocument, DomError, NodeSpec};

#[test]
fn loads_nested_snapshot_and_walks_it() {
    let doc = DomDocument::from_json(
        r#"{"tag":"html","children":[
            {"tag":"head"},
            {"tag":"body","children":[
                {"tag":"ul","children":[
                    {"tag":"li","text":"one"},
                    {"tag":"li","text":"two"}
                ]}
            ]}
        ]}"#,
    )
    .expect("snapshot");

    let body = doc.body().expect("body");
    assert_eq!(doc.tag_name(body), Some("body"));
    let items = doc.select_all("li").unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(doc.text_content(items[1]), "two");
    assert_eq!(doc.same_tag_position(items[1]), Some(2));
    assert_eq!(doc.ancestors(items[0]).count(), 3);
}

#[test]
fn inserted_subtree_is_reported_in_document_order() {
    let mut doc = DomDocument::with_body();
    let body = doc.body().unwrap();
    let inserted = doc
        .insert_subtree(
            body,
            &NodeSpec::element("section")
                .child(NodeSpec::element("h2").with_text("Title"))
                .child(NodeSpec::element("button").with_onclick()),
        )
        .unwrap();
    let tags: Vec<_> = inserted
        .iter()
        .map(|id| doc.tag_name(*id).unwrap().to_string())
        .collect();
    assert_eq!(tags, ["section", "h2", "button"]);
    assert!(doc.node(inserted[2]).unwrap().has_click_handler);
    assert!(doc.is_connected(inserted[2]));
}

#[test]
fn rejects_malformed_snapshots() {
    let err = DomDocument::from_json("{\"tag\": 12}").unwrap_err();
    assert!(matches!(err, DomError::InvalidSnapshot(_)));
}
