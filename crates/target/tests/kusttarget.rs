use kilt_core::{Behavior, Gvk, KiltError, ResId, ResMap, Resource};
use kilt_generate::GeneratorOptions;
use kilt_loader::FakeLoader;
use kilt_target::{BuildOptions, KustTarget};
use serde_json::{json, Value as Json};

const KUSTOMIZATION_1: &str = r#"
namePrefix: foo-
nameSuffix: -bar
namespace: ns1
commonLabels:
  app: nginx
commonAnnotations:
  note: This is a test annotation
resources:
  - deployment.yaml
  - namespace.yaml
configMapGenerator:
- name: literalConfigMap
  literals:
  - DB_USERNAME=admin
  - DB_PASSWORD=somepw
secretGenerator:
- name: secret
  commands:
    DB_USERNAME: "printf admin"
    DB_PASSWORD: "printf somepw"
  type: Opaque
patchesJson6902:
- target:
    group: apps
    version: v1
    kind: Deployment
    name: dply1
  path: jsonpatch.json
"#;

const KUSTOMIZATION_2: &str = r#"
secretGenerator:
- name: secret
  timeoutSeconds: 1
  commands:
    USER: "sleep 2"
  type: Opaque
"#;

const DEPLOYMENT: &str = "apiVersion: apps/v1\nmetadata:\n  name: dply1\nkind: Deployment\n";
const NAMESPACE: &str = "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: ns1\n";
const JSON_PATCH: &str = r#"[
    {"op": "add", "path": "/spec/replica", "value": "3"}
]"#;

fn loader_1() -> FakeLoader {
    let ldr = FakeLoader::new("/testpath");
    ldr.add_file("/testpath/kustomization.yaml", KUSTOMIZATION_1).unwrap();
    ldr.add_file("/testpath/deployment.yaml", DEPLOYMENT).unwrap();
    ldr.add_file("/testpath/namespace.yaml", NAMESPACE).unwrap();
    ldr.add_file("/testpath/jsonpatch.json", JSON_PATCH).unwrap();
    ldr
}

fn target(ldr: &FakeLoader) -> KustTarget {
    KustTarget::new(Box::new(ldr.clone())).unwrap()
}

fn id(gvk: Gvk, name: &str, namespace: &str) -> ResId {
    ResId::new(gvk, name).with_namespace(namespace).with_prefix_suffix("foo-", "-bar")
}

fn doc_of(m: &ResMap, id: &ResId) -> Json {
    m.get(id).unwrap_or_else(|| panic!("missing {}; have {:?}", id, m.ids())).doc().clone()
}

#[cfg(unix)]
#[test]
fn resources_1() {
    let m = target(&loader_1()).make_customized_res_map().unwrap();
    assert_eq!(m.len(), 4);

    let labels = json!({ "app": "nginx" });
    let annotations = json!({ "note": "This is a test annotation" });

    let deploy = id(Gvk::new("apps", "v1", "Deployment"), "dply1", "ns1");
    assert_eq!(doc_of(&m, &deploy), json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": { "name": "foo-dply1-bar", "namespace": "ns1", "labels": labels, "annotations": annotations },
        "spec": {
            "replica": "3",
            "selector": { "matchLabels": { "app": "nginx" } },
            "template": { "metadata": { "annotations": annotations, "labels": labels } }
        }
    }));

    let cmap = id(Gvk::new("", "v1", "ConfigMap"), "literalConfigMap", "ns1");
    assert_eq!(doc_of(&m, &cmap), json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": { "name": "foo-literalConfigMap-bar-8d2dkb8k24", "namespace": "ns1", "labels": labels, "annotations": annotations },
        "data": { "DB_USERNAME": "admin", "DB_PASSWORD": "somepw" }
    }));
    assert_eq!(m.get(&cmap).unwrap().behavior(), Behavior::Create);

    let secret = id(Gvk::new("", "v1", "Secret"), "secret", "ns1");
    assert_eq!(doc_of(&m, &secret), json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": { "name": "foo-secret-bar-9btc7bt4kb", "namespace": "ns1", "labels": labels, "annotations": annotations },
        "type": "Opaque",
        "data": { "DB_USERNAME": "YWRtaW4=", "DB_PASSWORD": "c29tZXB3" }
    }));
    assert_eq!(m.get(&secret).unwrap().behavior(), Behavior::Create);

    let ns = id(Gvk::new("", "v1", "Namespace"), "ns1", "");
    assert_eq!(doc_of(&m, &ns), json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": { "name": "foo-ns1-bar", "labels": labels, "annotations": annotations }
    }));
    assert_eq!(m.get(&ns).unwrap().behavior(), Behavior::Unspecified);
}

#[test]
fn resource_not_found() {
    let ldr = FakeLoader::new("/testpath");
    ldr.add_file("/testpath/kustomization.yaml", KUSTOMIZATION_1).unwrap();
    let err = target(&ldr).make_customized_res_map().unwrap_err();
    assert!(err.to_string().contains(r#"cannot read file "/testpath/deployment.yaml""#), "err={}", err);
}

#[cfg(unix)]
#[test]
fn secret_timeout() {
    let ldr = FakeLoader::new("/testpath");
    ldr.add_file("/testpath/kustomization.yaml", KUSTOMIZATION_2).unwrap();
    let err = target(&ldr).make_customized_res_map().unwrap_err();
    assert!(matches!(err, KiltError::Generator { .. }), "err={}", err);
    assert!(err.to_string().contains("killed"), "err={}", err);
}

fn find_secret(m: &ResMap) -> &Resource {
    m.find(|r| r.kind() == "Secret").expect("a Secret")
}

#[cfg(unix)]
#[test]
fn disable_name_suffix_hash() {
    let kt = target(&loader_1());
    let m = kt.make_customized_res_map().unwrap();
    assert_eq!(find_secret(&m).name(), "foo-secret-bar-9btc7bt4kb");

    let opts = BuildOptions { generator_options: Some(GeneratorOptions { disable_name_suffix_hash: true, ..Default::default() }) };
    let m = kt.build(&opts).unwrap();
    assert_eq!(find_secret(&m).name(), "foo-secret-bar");

    // Options are per build; the loaded kustomization is untouched.
    let m = kt.make_customized_res_map().unwrap();
    assert_eq!(find_secret(&m).name(), "foo-secret-bar-9btc7bt4kb");
    let m = kt.build(&BuildOptions::default().with_disable_name_suffix_hash(kt.kustomization(), true)).unwrap();
    assert_eq!(find_secret(&m).name(), "foo-secret-bar");
}

fn write(ldr: &FakeLoader, dir: &str, content: &str) {
    ldr.add_file(format!("{}/kustomization.yaml", dir), format!("\napiVersion: v1\nkind: Kustomization\n{}", content)).unwrap();
}

#[test]
fn hash_toggle_is_scoped_to_its_own_level() {
    let ldr = FakeLoader::new("/app/overlay");
    write(&ldr, "/app/base", "configMapGenerator:\n- name: basecm\n  literals: [A=1]\n");
    write(
        &ldr,
        "/app/overlay",
        "bases:\n- ../base\ngeneratorOptions:\n  disableNameSuffixHash: true\nconfigMapGenerator:\n- name: topcm\n  literals: [B=2]\n",
    );
    let kt = target(&ldr);
    let m = kt.make_customized_res_map().unwrap();
    let names: Vec<&str> = m.iter().map(|r| r.name()).collect();
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("basecm-") && names[0].len() == "basecm-".len() + 10, "names={:?}", names);
    assert_eq!(names[1], "topcm");

    // Disabling through build options only affects the root level as well.
    write(&ldr, "/app/overlay", "bases:\n- ../base\nconfigMapGenerator:\n- name: topcm\n  literals: [B=2]\n");
    let kt = target(&ldr);
    let m = kt.build(&BuildOptions::default().with_disable_name_suffix_hash(kt.kustomization(), true)).unwrap();
    let names: Vec<&str> = m.iter().map(|r| r.name()).collect();
    assert!(names[0].starts_with("basecm-"), "names={:?}", names);
    assert_eq!(names[1], "topcm");
}

#[test]
fn directories_that_are_substrings_of_each_other() {
    let ldr = FakeLoader::new("/app/overlays/aws-sandbox2.us-east-1");
    write(&ldr, "/app/base", "");
    write(&ldr, "/app/overlays/aws", "\nbases:\n- ../../base\n");
    write(&ldr, "/app/overlays/aws-nonprod", "\nbases:\n- ../aws\n");
    write(&ldr, "/app/overlays/aws-sandbox2.us-east-1", "\nbases:\n- ../aws-nonprod\n");
    let m = target(&ldr).make_customized_res_map().unwrap();
    assert!(m.is_empty());
}

#[test]
fn base_cycles_are_detected() {
    let ldr = FakeLoader::new("/app/a");
    write(&ldr, "/app/a", "bases:\n- ../b\n");
    write(&ldr, "/app/b", "bases:\n- ../a\n");
    let err = target(&ldr).make_customized_res_map().unwrap_err();
    assert!(matches!(err, KiltError::Cycle { ref path } if path == "/app/a"), "err={}", err);
}

#[test]
fn the_same_base_twice_collides() {
    let ldr = FakeLoader::new("/app/overlay");
    write(&ldr, "/app/base", "resources:\n- cm.yaml\n");
    ldr.add_file("/app/base/cm.yaml", "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: shared\n").unwrap();
    write(&ldr, "/app/overlay", "bases:\n- ../base\n- ../overlay/../base\n");
    let err = target(&ldr).make_customized_res_map().unwrap_err();
    assert!(matches!(err, KiltError::DuplicateResource { .. }), "err={}", err);
}

#[test]
fn sibling_bases_decorated_apart_can_share_names() {
    let ldr = FakeLoader::new("/app/overlay");
    for side in ["left", "right"] {
        write(&ldr, &format!("/app/{}", side), &format!("namePrefix: {}-\nresources:\n- svc.yaml\n", side));
        ldr.add_file(format!("/app/{}/svc.yaml", side), "apiVersion: v1\nkind: Service\nmetadata:\n  name: web\n").unwrap();
    }
    write(&ldr, "/app/overlay", "namePrefix: top-\nnamespace: prod\nbases:\n- ../left\n- ../right\n");
    let m = target(&ldr).make_customized_res_map().unwrap();
    let names: Vec<&str> = m.iter().map(|r| r.name()).collect();
    assert_eq!(names, vec!["top-left-web", "top-right-web"]);
    assert!(m.iter().all(|r| r.namespace() == Some("prod")));
}

#[test]
fn overlay_transformers_reach_base_resources() {
    let ldr = FakeLoader::new("/app/overlay");
    write(&ldr, "/app/base", "namePrefix: base-\ncommonLabels:\n  tier: web\nresources:\n- deploy.yaml\n");
    ldr.add_file(
        "/app/base/deploy.yaml",
        "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  template:\n    spec:\n      containers:\n      - name: web\n        image: nginx:1.19\n",
    )
    .unwrap();
    write(
        &ldr,
        "/app/overlay",
        "namePrefix: prod-\ncommonLabels:\n  env: prod\nbases:\n- ../base\npatchesJson6902:\n- target: {group: apps, version: v1, kind: Deployment, name: web}\n  path: replicas.yaml\nimages:\n- name: nginx\n  newTag: \"1.21\"\n",
    );
    ldr.add_file("/app/overlay/replicas.yaml", "- op: add\n  path: /spec/replicas\n  value: 3\n").unwrap();
    let m = target(&ldr).make_customized_res_map().unwrap();
    let d = m.iter().next().unwrap().doc().clone();
    assert_eq!(d["metadata"]["name"], "prod-base-web");
    assert_eq!(d["metadata"]["labels"], json!({ "tier": "web", "env": "prod" }));
    assert_eq!(d["spec"]["selector"]["matchLabels"], json!({ "tier": "web", "env": "prod" }));
    assert_eq!(d["spec"]["replicas"], 3);
    assert_eq!(d["spec"]["template"]["spec"]["containers"][0]["image"], "nginx:1.21");
    let id = m.ids().remove(0);
    assert_eq!((id.prefix.as_str(), id.name.as_str()), ("prod-base-", "web"));
}

#[test]
fn generator_behaviors_across_levels() {
    let ldr = FakeLoader::new("/app/overlay");
    write(&ldr, "/app/base", "namePrefix: base-\nconfigMapGenerator:\n- name: settings\n  literals: [A=1, B=1]\n");
    write(
        &ldr,
        "/app/overlay",
        "bases:\n- ../base\nconfigMapGenerator:\n- name: settings\n  behavior: merge\n  literals: [B=2, C=3]\n",
    );
    let m = target(&ldr).make_customized_res_map().unwrap();
    assert_eq!(m.len(), 1);
    let r = m.iter().next().unwrap();
    assert_eq!(r.doc()["data"], json!({ "A": "1", "B": "2", "C": "3" }));
    assert!(r.name().starts_with("base-settings-"), "name={}", r.name());

    write(&ldr, "/app/overlay", "bases:\n- ../base\nconfigMapGenerator:\n- name: settings\n  behavior: replace\n  literals: [Z=9]\n");
    let m = target(&ldr).make_customized_res_map().unwrap();
    assert_eq!(m.iter().next().unwrap().doc()["data"], json!({ "Z": "9" }));

    write(&ldr, "/app/overlay", "configMapGenerator:\n- name: dup\n  literals: [A=1]\n- name: dup\n  literals: [B=2]\n");
    let err = target(&ldr).make_customized_res_map().unwrap_err();
    assert!(matches!(err, KiltError::DuplicateResource { .. }), "err={}", err);

    write(&ldr, "/app/overlay", "bases:\n- ../base\nconfigMapGenerator:\n- name: other\n  behavior: merge\n  literals: [Z=9]\n");
    let err = target(&ldr).make_customized_res_map().unwrap_err();
    assert!(err.to_string().contains("found no existing"), "err={}", err);
}

#[test]
fn references_follow_hashed_names() {
    let ldr = FakeLoader::new("/app");
    write(
        &ldr,
        "/app",
        "namePrefix: p-\nresources:\n- pod.yaml\nconfigMapGenerator:\n- name: cfg\n  literals: [K=v]\n",
    );
    ldr.add_file(
        "/app/pod.yaml",
        "apiVersion: v1\nkind: Pod\nmetadata:\n  name: runner\nspec:\n  volumes:\n  - name: c\n    configMap:\n      name: cfg\n",
    )
    .unwrap();
    let m = target(&ldr).make_customized_res_map().unwrap();
    let cm = m.find(|r| r.kind() == "ConfigMap").unwrap().name().to_string();
    assert!(cm.starts_with("p-cfg-"), "name={}", cm);
    let pod = m.find(|r| r.kind() == "Pod").unwrap();
    assert_eq!(pod.doc()["spec"]["volumes"][0]["configMap"]["name"], Json::String(cm));
}

#[test]
fn unknown_kustomization_keys_abort_the_build() {
    let ldr = FakeLoader::new("/app");
    write(&ldr, "/app", "resourcez:\n- x.yaml\n");
    let err = KustTarget::new(Box::new(ldr.clone())).err().expect("config error");
    assert!(matches!(err, KiltError::Config { .. }), "err={}", err);
}
