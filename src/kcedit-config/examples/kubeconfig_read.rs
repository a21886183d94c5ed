use kcedit_config::KubeConfig;

fn main() {
    // Resolve the config path (KUBECONFIG or $HOME/.kube/config)
    // current context, its namespace
    // clusters and users referenced from every context

    fluvio_future::subscriber::init_tracer(None);
    let config = KubeConfig::from_home().expect("Load failed");

    println!("path: {}", config.path.display());
    if let Some(ctx) = config.current_context() {
        println!("current: {} (namespace {})", ctx.name, ctx.context.namespace());
    }
    for line in config.list_contexts() {
        println!("{line}");
    }
    for line in config.list_clusters() {
        println!("cluster {line}");
    }
    for line in config.list_users() {
        println!("user {line}");
    }
}
