fn main() {
    // Only the firmware image needs the ESP-IDF environment exported;
    // host builds of the library and its tests skip it.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
