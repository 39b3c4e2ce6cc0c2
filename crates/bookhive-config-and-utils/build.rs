fn main() {
    // option_env!() values are cached unless cargo is told to watch them.
    println!("cargo:rerun-if-env-changed=SUPABASE_URL");
    println!("cargo:rerun-if-env-changed=SUPABASE_ANON_KEY");
}
