// Structural fidelity of serialize/adopt across two nodes, and the
// loopback equivalence of exported functions.

use capnode_core::{ApiValue, Capnode, Message};

fn sample_trees() -> Vec<ApiValue> {
    vec![
        ApiValue::from("plain"),
        ApiValue::from(-7i64),
        ApiValue::float(2.5).unwrap(),
        ApiValue::object([("", ApiValue::from("empty key"))]),
        ApiValue::array([]),
        ApiValue::object([
            ("greeting", ApiValue::from("héllo, wörld")),
            (
                "nested",
                ApiValue::object([(
                    "xs",
                    ApiValue::array([
                        ApiValue::from(1i64),
                        ApiValue::from(2u64),
                        ApiValue::array([ApiValue::from("deep")]),
                    ]),
                )]),
            ),
        ]),
    ]
}

#[tokio::test]
async fn function_free_trees_round_trip_structurally() {
    let exporter = Capnode::new();
    let importer = Capnode::new();
    for tree in sample_trees() {
        let shape = exporter.expose(tree.clone());
        // The wire form itself must survive JSON.
        let json = serde_json::to_string(&shape).unwrap();
        let shape = serde_json::from_str(&json).unwrap();
        assert_eq!(importer.adopt(&shape), tree);
    }
    assert_eq!(exporter.exported_methods(), 0);
}

#[tokio::test]
async fn loopback_mirror_behaves_like_the_original() {
    // A node adopting its own exported shape yields proxies that route
    // through the full dispatch path back into the original functions.
    let node = Capnode::new();
    let shape = node.expose(ApiValue::object([
        (
            "double",
            ApiValue::function(|args: Vec<ApiValue>| async move {
                let n = args.first().and_then(ApiValue::as_i64).unwrap_or(0);
                Ok(ApiValue::from(n * 2))
            }),
        ),
        (
            "fail",
            ApiValue::function(|_| async {
                Err(capnode_core::RpcError::method("original failure"))
            }),
        ),
    ]));

    let loopback = node.clone();
    node.add_listener(move |msg: &Message| {
        let _ = loopback.receive(msg.clone());
    });

    let mirror = node.adopt(&shape);
    let result = mirror
        .get("double")
        .unwrap()
        .invoke(vec![ApiValue::from(21i64)])
        .await
        .unwrap();
    assert_eq!(result.as_i64(), Some(42));

    let err = mirror.get("fail").unwrap().invoke(vec![]).await.unwrap_err();
    assert!(err.to_string().contains("original failure"));
}

#[tokio::test]
async fn every_function_leaf_has_a_live_registration() {
    let node = Capnode::new();
    let shape = node.expose(ApiValue::object([
        (
            "top",
            ApiValue::function(|_| async { Ok(ApiValue::from("t")) }),
        ),
        (
            "inner",
            ApiValue::object([(
                "deep",
                ApiValue::array([ApiValue::function(|_| async { Ok(ApiValue::from("d")) })]),
            )]),
        ),
    ]));

    assert_eq!(shape.function_handles().len(), 2);
    assert_eq!(node.exported_methods(), 2);
}
